//! Integration tests for mirroring a server tree into a client shadow tree.

use simtree::component::variants;
use simtree::constants::TAG_BASIC;
use simtree::{
    BuilderRegistry, Component, Config, Error, Map, NodeKind, ServerRoot, ShadowTree, SignalFrame,
    Uri,
};

fn registry() -> BuilderRegistry {
    let mut registry = BuilderRegistry::new();
    variants::register_core_builders(&mut registry);
    registry
}

fn server() -> ServerRoot {
    let config = Config { client_id: "server".to_string(), ..Config::default() };
    ServerRoot::new(config, registry()).unwrap()
}

fn client() -> ShadowTree {
    ShadowTree::new(&Config { client_id: "client".to_string(), ..Config::default() })
}

/// Serialize and reparse a frame as a transport would.
fn wire(frame: &SignalFrame) -> SignalFrame {
    SignalFrame::parse(&frame.to_xml_string()).unwrap()
}

/// Deliver `request` and every follow-up it triggers.
fn exchange(server: &mut ServerRoot, client: &mut ShadowTree, request: SignalFrame) -> Vec<Error> {
    let mut errors = Vec::new();
    let mut outbox = vec![request];
    while let Some(frame) = outbox.pop() {
        let mut incoming: Vec<SignalFrame> = server.process_now(&wire(&frame)).into_iter().collect();
        incoming.extend(server.drain_outbound());
        for reply in incoming {
            match client.handle_frame(&wire(&reply)) {
                Ok(Some(follow_up)) => outbox.push(follow_up),
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }
    }
    errors
}

fn child_names(tree: &ShadowTree) -> Vec<(String, NodeKind)> {
    tree.root().children().iter().map(|c| (c.name().to_string(), c.kind())).collect()
}

#[test]
fn test_server_replacement_keeps_local_nodes() {
    let mut server = server();
    let mut client = client();
    server.with_root(|root| root.add_child(variants::group("serverA")).map(|_| ())).unwrap();
    server.flush_notifications();
    server.drain_outbound();

    let request = client.request_tree();
    assert!(exchange(&mut server, &mut client, request).is_empty());
    assert_eq!(child_names(&client), vec![("serverA".to_string(), NodeKind::Standard)]);

    client.add_local_node(Component::new("localB", "Group"), false).unwrap();

    server.with_root(|root| -> simtree::Result<()> {
        root.remove_child("serverA")?;
        root.add_child(variants::group("serverA2"))?;
        Ok(())
    })
    .unwrap();
    server.flush_notifications();
    let broadcasts = server.drain_outbound();
    assert_eq!(broadcasts.len(), 1);

    let follow_up = client.handle_frame(&wire(&broadcasts[0])).unwrap().unwrap();
    assert!(exchange(&mut server, &mut client, follow_up).is_empty());
    assert_eq!(
        child_names(&client),
        vec![
            ("localB".to_string(), NodeKind::Local),
            ("serverA2".to_string(), NodeKind::Standard)
        ]
    );
    assert_eq!(client.pending_requests(), 0);
}

#[test]
fn test_remote_create_triggers_resync() {
    let mut server = server();
    let mut client = client();
    let request = client.request_tree();
    exchange(&mut server, &mut client, request);

    let mut args = Map::new();
    args.set_value("name", "mesh".to_string()).unwrap();
    args.set_value("atype", "Group".to_string()).unwrap();
    let create = SignalFrame::new("create_component", Uri::parse("/Root"), "client").with_args(args);
    assert!(exchange(&mut server, &mut client, create).is_empty());

    assert!(client.node_by_path(&Uri::parse("/Root/mesh")).is_some());
    assert_eq!(server.journal().unwrap().lock().unwrap().len(), 3);
}

#[test]
fn test_malformed_reply_leaves_tree_intact() {
    let mut server = server();
    let mut client = client();
    server.with_root(|root| root.add_child(variants::group("mesh")).map(|_| ())).unwrap();
    let request = client.request_tree();
    exchange(&mut server, &mut client, request);
    let before = child_names(&client);

    let request = client.request_tree();
    let mut broken = request.reply_to("server");
    let mut tree = Map::new();
    tree.set_subtree("tree", simtree::XmlNode::new("node").with_attr("name", "Root"))
        .unwrap();
    broken.args = tree;

    assert!(client.handle_frame(&broken).is_err());
    assert_eq!(child_names(&client), before);
}

#[test]
fn test_options_round_trip_through_server() {
    let mut server = server();
    let mut client = client();
    server
        .with_root(|root| -> simtree::Result<()> {
            let solver = root.add_child(variants::group("solver"))?;
            solver.add_tag(TAG_BASIC);
            solver.options_mut().add_option("cfl", 0.5_f64, "Courant number")?;
            solver.options_mut().add_array_option("origin", vec![0.0_f64; 3], "Origin")?;
            Ok(())
        })
        .unwrap();
    let request = client.request_tree();
    exchange(&mut server, &mut client, request);

    let path = Uri::parse("/Root/solver");
    let frame = client
        .modify_options(&path, &[("cfl", "0.8"), ("origin", "1;2;3")])
        .unwrap()
        .unwrap();
    assert!(exchange(&mut server, &mut client, frame).is_empty());

    let server_cfl = server.with_root(|root| {
        root.resolve(&Uri::parse("solver")).unwrap().options().value::<f64>("cfl").unwrap()
    });
    assert_eq!(server_cfl, 0.8);
    let shadow = client.node_by_path(&path).unwrap().component().options();
    assert_eq!(shadow.value::<f64>("cfl").unwrap(), 0.8);
    assert_eq!(shadow.array::<f64>("origin").unwrap(), vec![1.0, 2.0, 3.0]);

    let err = client.modify_options(&path, &[("cfl", "fast")]).unwrap_err();
    assert!(matches!(err, Error::MalformedPayload(_)));
}

#[test]
fn test_failed_remote_call_is_reported() {
    let mut server = server();
    let mut client = client();
    let request = client.request_tree();
    exchange(&mut server, &mut client, request);

    let frame = client.request_signature(&Uri::parse("/Root"), "does_not_exist").unwrap();
    let errors = exchange(&mut server, &mut client, frame);
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], Error::DispatchFailure { message, .. } if message.starts_with("[dispatch_failure]")));
    assert!(client.signature(&Uri::parse("/Root"), "does_not_exist").is_none());

    let frame = client.request_signature(&Uri::parse("/Root"), "rename_component").unwrap();
    assert!(exchange(&mut server, &mut client, frame).is_empty());
    let signature = client.signature(&Uri::parse("/Root"), "rename_component").unwrap();
    assert_eq!(signature.keys(), vec!["name", "new_name"]);
}

#[test]
fn test_content_refresh_without_resync() {
    let mut server = server();
    let mut client = client();
    server
        .with_root(|root| -> simtree::Result<()> {
            let solver = root.add_child(variants::group("solver"))?;
            solver.options_mut().add_option("cfl", 0.5_f64, "Courant number")?;
            Ok(())
        })
        .unwrap();
    server.flush_notifications();
    server.drain_outbound();
    let request = client.request_tree();
    exchange(&mut server, &mut client, request);

    server.with_root(|root| {
        let solver = root.resolve_mut(&Uri::parse("solver")).unwrap();
        solver.options_mut().set_typed("cfl", 0.25_f64).unwrap();
        solver.options_mut().add_option("steps", 40_u32, "Iterations").unwrap();
    });

    let path = Uri::parse("/Root/solver");
    let request = client.request_content(&path).unwrap();
    assert!(exchange(&mut server, &mut client, request).is_empty());

    let options = client.node_by_path(&path).unwrap().component().options();
    assert_eq!(options.value::<f64>("cfl").unwrap(), 0.25);
    assert_eq!(options.value::<u32>("steps").unwrap(), 40);
    assert_eq!(server.broadcasts(), 1);
}
