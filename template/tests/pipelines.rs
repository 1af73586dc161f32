use stackgraph_template::{
    instantiate, instantiate_into, render, resolve, CasePolicy, Catalog, CollisionScope,
    Deployment, EdgeTarget, Error, ExportValues, GraphBuilder, ResourceGraph, TemplateKind,
    TemplateParameters,
};

fn catalog() -> Catalog {
    Catalog::standard()
}

fn device_identity(builder: &mut GraphBuilder, prefix: &str) -> Result<(), Error> {
    let catalog = catalog();
    let template = catalog.get(TemplateKind::DeviceIdentityPipeline).unwrap();
    let params = TemplateParameters::new()
        .with("prefix", prefix)
        .with("region", "us-east-1");

    instantiate_into(builder, template, &params)
}

fn container_service(prefix: &str) -> ResourceGraph {
    let catalog = catalog();
    let template = catalog.get(TemplateKind::ContainerServicePipeline).unwrap();
    let params = TemplateParameters::from([
        ("prefix", prefix),
        ("account", "123456789012"),
        ("region", "us-east-1"),
    ]);

    instantiate(template, &params).unwrap()
}

fn platform_exports(prefix: &str) -> ExportValues {
    ExportValues::from([
        (
            format!("{prefix}EcrRepositoryUri"),
            format!(
                "123456789012.dkr.ecr.us-east-1.amazonaws.com/my-iot-{}-app",
                prefix.to_lowercase()
            ),
        ),
        (
            "EcsTaskExecutionRoleArn".to_string(),
            "arn:aws:iam::123456789012:role/ecsTaskExecutionRole".to_string(),
        ),
        ("EcsClusterName".to_string(), "IoTCluster".to_string()),
        (
            "IoTClusterVpcPublicSubnetIds".to_string(),
            "subnet-0a1,subnet-0b2".to_string(),
        ),
    ])
}

#[test]
fn container_service_nodes_and_task_role_edge() {
    let graph = container_service("ENV");

    for name in ["ENVTaskRole", "IoTENVTaskDefinition", "ENVContainer", "ENVIoTService"] {
        assert!(graph.node(name).is_some(), "missing {name}");
    }

    let edge = graph
        .edges_from("IoTENVTaskDefinition")
        .find(|e| e.to_node() == Some("ENVTaskRole"))
        .unwrap();

    assert_eq!(edge.property, "TaskRoleArn");
    assert_eq!(
        edge.to,
        EdgeTarget::Node {
            name: "ENVTaskRole".into(),
            attribute: Some("Arn".into()),
        }
    );
}

#[test]
fn instantiate_is_deterministic() {
    let catalog = catalog();

    for template in catalog.iter() {
        let params = match template.kind() {
            TemplateKind::ContainerCluster => TemplateParameters::from([("region", "us-east-1")]),
            TemplateKind::ContainerRegistry | TemplateKind::DeviceConfiguration => {
                TemplateParameters::from([("prefix", "GPS")])
            }
            TemplateKind::DeviceIdentityPipeline => {
                TemplateParameters::from([("prefix", "GPS"), ("region", "us-east-1")])
            }
            TemplateKind::WebAuth => TemplateParameters::from([("prefix", "Wildlife")]),
            TemplateKind::DataBucket => {
                TemplateParameters::from([("account", "123456789012"), ("region", "us-east-1")])
            }
            TemplateKind::IngestionPipeline
            | TemplateKind::ContainerServicePipeline
            | TemplateKind::AnalyticsCrawler => {
                TemplateParameters::from([
                    ("prefix", "GPS"),
                    ("account", "123456789012"),
                    ("region", "us-east-1"),
                ])
            }
        };

        let first = instantiate(template, &params).unwrap();
        let second = instantiate(template, &params).unwrap();

        assert_eq!(first, second, "{}", template.kind());
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn prefixes_only_change_names() {
    let gps = serde_json::to_string(&container_service("GPS")).unwrap();
    let env = serde_json::to_string(&container_service("ENV")).unwrap();

    assert_eq!(gps.replace("GPS", "ENV").replace("gps", "env"), env);
}

#[test]
fn missing_prefix_is_a_parameter_error() {
    let catalog = catalog();
    let template = catalog.get(TemplateKind::DeviceIdentityPipeline).unwrap();
    let params = TemplateParameters::from([("region", "us-east-1")]);

    let error = instantiate(template, &params).unwrap_err();

    assert!(matches!(&error, Error::Parameter { .. }));
    assert_eq!(error.field(), Some("prefix"));
    assert_eq!(
        error.to_string(),
        "Invalid parameter \"prefix\" for template device-identity-pipeline: required but missing"
    );
}

#[test]
fn gps_and_gps_lowercase_are_distinct_by_default() {
    let mut builder = GraphBuilder::new("IotCodeStack");
    device_identity(&mut builder, "GPS").unwrap();
    device_identity(&mut builder, "gps").unwrap();

    let graph = builder.build().unwrap();

    assert!(graph.node("GPSThing").is_some());
    assert!(graph.node("gpsThing").is_some());
    assert_eq!(graph.nodes.len(), 16);
    assert_eq!(
        graph.instances,
        vec!["device-identity-pipeline[GPS]", "device-identity-pipeline[gps]"]
    );
}

#[test]
fn gps_and_gps_lowercase_collide_when_case_insensitive() {
    let mut builder = GraphBuilder::new("IotCodeStack").with_case_policy(CasePolicy::Insensitive);
    device_identity(&mut builder, "GPS").unwrap();

    let error = device_identity(&mut builder, "gps").unwrap_err();

    assert_eq!(
        error,
        Error::NameCollision {
            scope: CollisionScope::Node,
            name: "gpsThing".into(),
            first: "device-identity-pipeline[GPS] (GPSThing)".into(),
            second: "device-identity-pipeline[gps]".into(),
        }
    );
}

#[test]
fn same_prefix_twice_collides() {
    let mut builder = GraphBuilder::new("IotCodeStack");
    device_identity(&mut builder, "ENV").unwrap();

    assert!(matches!(
        device_identity(&mut builder, "ENV"),
        Err(Error::NameCollision {
            scope: CollisionScope::Node,
            ..
        })
    ));
}

#[test]
fn missing_repository_export_names_the_container() {
    let graph = container_service("GPS");
    let mut exports = platform_exports("GPS");
    exports.remove("GPSEcrRepositoryUri");

    let error = resolve(&[graph], &exports).unwrap_err();

    assert_eq!(
        error,
        Error::MissingExport {
            graph: "GPSContainerServicePipeline".into(),
            node: "GPSContainer".into(),
            property: "Image".into(),
            export: "GPSEcrRepositoryUri".into(),
        }
    );
}

#[test]
fn resolve_is_idempotent_and_order_independent() {
    let graphs = vec![container_service("GPS"), container_service("ENV")];
    let mut exports = platform_exports("GPS");
    exports.extend(platform_exports("ENV"));

    let once = resolve(&graphs, &exports).unwrap();
    let twice = resolve(&once, &exports).unwrap();
    assert_eq!(once, twice);

    let reversed: Vec<ResourceGraph> = graphs.iter().rev().cloned().collect();
    let mut reversed = resolve(&reversed, &exports).unwrap();
    reversed.reverse();
    assert_eq!(once, reversed);

    for graph in &once {
        assert!(graph.is_resolved());
    }
}

#[test]
fn platform_deploys_publishers_first() {
    let catalog = catalog();
    let instance = |kind: TemplateKind, params: &[(&str, &str)]| {
        let mut values = TemplateParameters::new();

        for (name, value) in params {
            values.insert(name, value);
        }

        instantiate(catalog.get(kind).unwrap(), &values).unwrap()
    };

    let graphs = vec![
        container_service("GPS"),
        instance(TemplateKind::ContainerRegistry, &[("prefix", "GPS")]),
        instance(TemplateKind::ContainerCluster, &[("region", "us-east-1")]),
        instance(
            TemplateKind::DeviceIdentityPipeline,
            &[("prefix", "GPS"), ("region", "us-east-1")],
        ),
    ];

    let deployment = Deployment::new(graphs, CasePolicy::Sensitive).unwrap();

    assert_eq!(
        deployment.order().unwrap(),
        vec![
            "GPSContainerRegistry",
            "ContainerCluster",
            "GPSContainerServicePipeline",
            "GPSDeviceIdentityPipeline",
        ]
    );
    assert!(deployment.unpublished_imports().is_empty());

    let graphs = deployment.resolve(&ExportValues::new(), true).unwrap();
    let service = render(&graphs[0]);

    assert_eq!(
        service["Resources"]["IoTGPSTaskDefinition"]["Properties"]["ContainerDefinitions"][0]
            ["Image"],
        serde_json::json!({"Fn::ImportValue": "GPSEcrRepositoryUri"})
    );
    assert_eq!(
        service["Outputs"]["GPSFargateServiceName"]["Export"]["Name"],
        "GPSFargateServiceName"
    );
}

#[test]
fn rendered_service_with_resolved_exports() {
    let graph = container_service("HEA");
    let resolved = resolve(&[graph], &platform_exports("HEA")).unwrap();
    let template = render(&resolved[0]);
    let resources = template["Resources"].as_object().unwrap();

    assert!(!resources.contains_key("HEAContainer"));
    assert_eq!(resources.len(), 4);

    let service = &resources["HEAIoTService"]["Properties"];
    assert_eq!(service["Cluster"], "IoTCluster");
    assert_eq!(
        service["NetworkConfiguration"]["AwsvpcConfiguration"]["Subnets"],
        serde_json::json!({"Fn::Split": [",", "subnet-0a1,subnet-0b2"]})
    );

    let container =
        &resources["IoTHEATaskDefinition"]["Properties"]["ContainerDefinitions"][0];
    assert_eq!(
        container["Image"],
        "123456789012.dkr.ecr.us-east-1.amazonaws.com/my-iot-hea-app"
    );
    assert_eq!(resources["HEALogGroup"]["DeletionPolicy"], "Delete");
}

#[test]
fn unknown_template_id() {
    assert_eq!(
        "device-identity".parse::<TemplateKind>(),
        Err(Error::UnknownTemplate("device-identity".into()))
    );
}
