//! Cognito sign-in for the field website: user pool, client and identity pool

use super::{limits, logical, managed_policy};
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::graph::{GraphBuilder, RemovalPolicy, ResourceKind, ResourceNode};
use crate::intrinsic::{get_att, reference};
use crate::params::{ParameterSpec, Parameters, Rule, PREFIX};
use serde_json::json;

const PARAMETERS: &[ParameterSpec] = &[ParameterSpec::required(
    PREFIX,
    Rule::Prefix,
    "Application prefix, e.g. Wildlife",
)];

const RESOURCES: &[ResourceKind] = &[
    ResourceKind::CognitoUserPool,
    ResourceKind::CognitoUserPoolClient,
    ResourceKind::CognitoIdentityPool,
    ResourceKind::IamRole,
    ResourceKind::CognitoIdentityPoolRoleAttachment,
];

pub struct WebAuth;

impl Blueprint for WebAuth {
    fn parameters(&self) -> &'static [ParameterSpec] {
        PARAMETERS
    }

    fn resources(&self) -> &'static [ResourceKind] {
        RESOURCES
    }

    fn build(&self, params: &Parameters, graph: &mut GraphBuilder) -> Result<()> {
        let prefix = params.prefix();

        let user_pool = logical(params, "user-pool")?;
        let client = logical(params, "user-pool-client")?;
        let identity_pool = logical(params, "identity-pool")?;
        let role = logical(params, "authenticated-role")?;

        let user_pool_name = params.checked(
            PREFIX,
            format!("{prefix}UserPool"),
            limits::COGNITO_POOL,
        )?;
        let identity_pool_name = params.checked(
            PREFIX,
            format!("{prefix}IdentityPool"),
            limits::COGNITO_POOL,
        )?;

        // Email is the user name, users sign themselves up
        graph.add(
            ResourceNode::new(
                &user_pool,
                ResourceKind::CognitoUserPool,
                json!({
                    "UserPoolName": user_pool_name,
                    "UsernameAttributes": ["email"],
                    "AutoVerifiedAttributes": ["email"],
                    "AdminCreateUserConfig": { "AllowAdminCreateUserOnly": false },
                    "Schema": [{
                        "Name": "email",
                        "Required": true,
                        "Mutable": false
                    }]
                }),
            )
            .removal(RemovalPolicy::Destroy),
        )?;

        graph.add(ResourceNode::new(
            &client,
            ResourceKind::CognitoUserPoolClient,
            json!({
                "UserPoolId": reference(&user_pool),
                "GenerateSecret": false
            }),
        ))?;

        graph.add(ResourceNode::new(
            &identity_pool,
            ResourceKind::CognitoIdentityPool,
            json!({
                "IdentityPoolName": identity_pool_name,
                "AllowUnauthenticatedIdentities": false,
                "CognitoIdentityProviders": [{
                    "ClientId": reference(&client),
                    "ProviderName": get_att(&user_pool, "ProviderName")
                }]
            }),
        ))?;

        graph.add(ResourceNode::new(
            &role,
            ResourceKind::IamRole,
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Federated": "cognito-identity.amazonaws.com" },
                        "Action": "sts:AssumeRoleWithWebIdentity",
                        "Condition": {
                            "StringEquals": {
                                "cognito-identity.amazonaws.com:aud": reference(&identity_pool)
                            },
                            "ForAnyValue:StringLike": {
                                "cognito-identity.amazonaws.com:amr": "authenticated"
                            }
                        }
                    }]
                },
                "ManagedPolicyArns": [managed_policy("AmazonS3FullAccess")]
            }),
        ))?;

        graph.add(ResourceNode::new(
            logical(params, "identity-pool-role-attachment")?,
            ResourceKind::CognitoIdentityPoolRoleAttachment,
            json!({
                "IdentityPoolId": reference(&identity_pool),
                "Roles": { "authenticated": get_att(&role, "Arn") }
            }),
        ))?;

        graph.export(
            &format!("{prefix}UserPoolId"),
            &user_pool,
            reference(&user_pool),
            &format!("User pool of {prefix}"),
        )?;

        graph.export(
            &format!("{prefix}UserPoolClientId"),
            &client,
            reference(&client),
            &format!("Web client of the {prefix} user pool"),
        )?;

        graph.export(
            &format!("{prefix}IdentityPoolId"),
            &identity_pool,
            reference(&identity_pool),
            &format!("Identity pool of {prefix}"),
        )?;

        graph.export(
            &format!("{prefix}AuthenticatedRoleArn"),
            &role,
            get_att(&role, "Arn"),
            &format!("Role assumed by signed-in {prefix} users"),
        )
    }
}
