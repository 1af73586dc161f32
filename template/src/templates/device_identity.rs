//! IoT thing, its policy and a certificate kept in Secrets Manager

use super::{assume_role, inline_policy, limits, logical, managed_policy};
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::graph::{GraphBuilder, RemovalPolicy, ResourceKind, ResourceNode};
use crate::intrinsic::{get_att, join, reference};
use crate::params::{ParameterSpec, Parameters, Rule, PREFIX, REGION};
use serde_json::json;

const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required(PREFIX, Rule::Prefix, "Device prefix, e.g. GPS"),
    ParameterSpec::required(REGION, Rule::Region, "Region the certificate is issued in"),
];

const RESOURCES: &[ResourceKind] = &[
    ResourceKind::IotThing,
    ResourceKind::IotPolicy,
    ResourceKind::IamRole,
    ResourceKind::LambdaFunction,
    ResourceKind::IotCertificate,
    ResourceKind::SecretsManagerSecret,
    ResourceKind::IotThingPrincipalAttachment,
    ResourceKind::IotPolicyPrincipalAttachment,
];

/// Issues a certificate on create, deactivates and deletes it on delete.
/// An update with a new region issues a fresh one and CloudFormation deletes the old.
const CERTIFICATE_PROVIDER: &str = r#"const response = require('cfn-response');
const {
  IoTClient,
  CreateKeysAndCertificateCommand,
  UpdateCertificateCommand,
  DeleteCertificateCommand,
} = require('@aws-sdk/client-iot');

exports.handler = async (event, context) => {
  const iot = new IoTClient({ region: event.ResourceProperties.Region });
  const reply = (status, id, data, noEcho) => new Promise((resolve) => {
    context.done = resolve;
    response.send(event, context, status, data, id, noEcho);
  });

  try {
    if (event.RequestType !== 'Delete') {
      const cert = await iot.send(new CreateKeysAndCertificateCommand({ setAsActive: true }));
      return reply(response.SUCCESS, cert.certificateId, {
        CertificateId: cert.certificateId,
        CertificateArn: cert.certificateArn,
        CertificatePem: cert.certificatePem,
        PrivateKey: cert.keyPair.PrivateKey,
      }, true);
    }

    const id = event.PhysicalResourceId;
    if (/^[0-9a-f]{64}$/.test(id)) {
      await iot.send(new UpdateCertificateCommand({ certificateId: id, newStatus: 'INACTIVE' }));
      await iot.send(new DeleteCertificateCommand({ certificateId: id, forceDelete: true }));
    }
    return reply(response.SUCCESS, id, {}, false);
  } catch (error) {
    console.error(error);
    return reply(response.FAILED, event.PhysicalResourceId || context.logStreamName, {}, false);
  }
};
"#;

/// Name of the secret holding a thing's certificate and private key
pub fn secret_name(prefix: &str) -> String {
    format!("IoT/{prefix}Thing/certs")
}

pub struct DeviceIdentityPipeline;

impl Blueprint for DeviceIdentityPipeline {
    fn parameters(&self) -> &'static [ParameterSpec] {
        PARAMETERS
    }

    fn resources(&self) -> &'static [ResourceKind] {
        RESOURCES
    }

    fn build(&self, params: &Parameters, graph: &mut GraphBuilder) -> Result<()> {
        let prefix = params.prefix();
        let region = params.require(REGION)?;

        let thing = logical(params, "thing")?;
        let policy = logical(params, "thing-policy")?;
        let provider_role = logical(params, "certificate-provider-role")?;
        let provider = logical(params, "certificate-provider")?;
        let certificate = logical(params, "thing-certificate")?;
        let secret = logical(params, "thing-secret")?;

        let thing_name = params.checked(PREFIX, format!("{prefix}Thing"), limits::IOT_THING)?;
        let policy_name = params.checked(
            PREFIX,
            format!("IoTDevicePolicy-{thing_name}"),
            limits::IOT_POLICY,
        )?;
        let secret_name = params.checked(PREFIX, secret_name(prefix), limits::SECRET)?;

        graph.add(ResourceNode::new(
            &thing,
            ResourceKind::IotThing,
            json!({ "ThingName": thing_name }),
        ))?;

        graph.add(
            ResourceNode::new(
                &policy,
                ResourceKind::IotPolicy,
                json!({
                    "PolicyName": policy_name,
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Action": ["iot:Connect", "iot:Publish", "iot:Subscribe", "iot:Receive"],
                            "Resource": "*"
                        }]
                    }
                }),
            )
            .removal(RemovalPolicy::Destroy),
        )?;

        graph.add(ResourceNode::new(
            &provider_role,
            ResourceKind::IamRole,
            json!({
                "AssumeRolePolicyDocument": assume_role("lambda.amazonaws.com"),
                "ManagedPolicyArns": [managed_policy("service-role/AWSLambdaBasicExecutionRole")],
                "Policies": [inline_policy(
                    params,
                    format!("{prefix}CertificateProvider"),
                    &[
                        "iot:CreateKeysAndCertificate",
                        "iot:DeleteCertificate",
                        "iot:UpdateCertificate",
                    ],
                    json!("*"),
                )?]
            }),
        ))?;

        graph.add(ResourceNode::new(
            &provider,
            ResourceKind::LambdaFunction,
            json!({
                "Runtime": "nodejs20.x",
                "Handler": "index.handler",
                "Timeout": 60,
                "Role": get_att(&provider_role, "Arn"),
                "Code": { "ZipFile": CERTIFICATE_PROVIDER }
            }),
        ))?;

        // The physical id of the custom resource is the certificate id once created
        graph.add(ResourceNode::new(
            &certificate,
            ResourceKind::IotCertificate,
            json!({
                "ServiceToken": get_att(&provider, "Arn"),
                "Region": region
            }),
        ))?;

        graph.add(
            ResourceNode::new(
                &secret,
                ResourceKind::SecretsManagerSecret,
                json!({
                    "Name": secret_name,
                    "SecretString": join(vec![
                        json!("{\"certificatePem\":\""),
                        get_att(&certificate, "CertificatePem"),
                        json!("\",\"privateKey\":\""),
                        get_att(&certificate, "PrivateKey"),
                        json!("\"}"),
                    ])
                }),
            )
            .removal(RemovalPolicy::Destroy),
        )?;

        graph.add(ResourceNode::new(
            logical(params, "thing-cert-attachment")?,
            ResourceKind::IotThingPrincipalAttachment,
            json!({
                "Principal": get_att(&certificate, "CertificateArn"),
                "ThingName": reference(&thing)
            }),
        ))?;

        // Policy is named literally, so the dependency has to be explicit
        graph.add(
            ResourceNode::new(
                logical(params, "thing-policy-attachment")?,
                ResourceKind::IotPolicyPrincipalAttachment,
                json!({
                    "Principal": get_att(&certificate, "CertificateArn"),
                    "PolicyName": policy_name
                }),
            )
            .depends_on(&policy),
        )?;

        graph.export(
            &format!("{prefix}ThingCertificateArn"),
            &certificate,
            get_att(&certificate, "CertificateArn"),
            &format!("Certificate of {thing_name}"),
        )?;

        graph.export(
            &format!("{prefix}ThingSecretArn"),
            &secret,
            reference(&secret),
            &format!("Secret with the certificate and private key of {thing_name}"),
        )
    }
}
