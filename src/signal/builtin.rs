//! Signals every component answers to.

use super::{ArgSpec, SignalContext, SignalList};
use crate::component::Component;
use crate::constants::{
    SIG_CONFIGURE, SIG_CREATE_COMPONENT, SIG_DELETE_COMPONENT, SIG_LIST_CONTENT, SIG_LIST_TREE,
    SIG_RENAME_COMPONENT, SIG_SIGNAL_SIGNATURE, TREE_KEY,
};
use crate::xml::{Map, ValueType};

/// Register the builtin signals on a fresh signal list.
pub fn register_builtin_signals(signals: &mut SignalList) {
    if let Err(e) = try_register(signals) {
        log::error!("Failed to register builtin signals: {e}");
    }
}

fn try_register(signals: &mut SignalList) -> crate::error::Result<()> {
    signals.regist_signal(SIG_CONFIGURE, configure, "Set option values")?;

    signals
        .regist_signal(SIG_CREATE_COMPONENT, create_component, "Create a child component")?
        .arg(ArgSpec::new("name", ValueType::String, "Name of the new component"))
        .arg(ArgSpec::new("atype", ValueType::String, "Concrete type to build"));

    signals
        .regist_signal(SIG_DELETE_COMPONENT, delete_component, "Delete a child component")?
        .arg(ArgSpec::new("name", ValueType::String, "Name of the child"));

    signals
        .regist_signal(SIG_RENAME_COMPONENT, rename_component, "Rename a child component")?
        .arg(ArgSpec::new("name", ValueType::String, "Current name"))
        .arg(ArgSpec::new("new_name", ValueType::String, "New name"));

    signals
        .regist_signal(SIG_LIST_TREE, list_tree, "Snapshot of the subtree")?
        .hidden(true)
        .read_only(true);

    signals
        .regist_signal(SIG_LIST_CONTENT, list_content, "Current option values")?
        .hidden(true)
        .read_only(true);

    signals
        .regist_signal(SIG_SIGNAL_SIGNATURE, signal_signature, "Argument layout of a signal")?
        .arg(ArgSpec::new("name", ValueType::String, "Signal name"))
        .hidden(true)
        .read_only(true);

    Ok(())
}

fn configure(target: &mut Component, args: &Map, _: &SignalContext<'_>) -> anyhow::Result<Option<Map>> {
    target.configure(args)?;
    Ok(Some(args.clone()))
}

fn create_component(
    target: &mut Component,
    args: &Map,
    ctx: &SignalContext<'_>,
) -> anyhow::Result<Option<Map>> {
    let name: String = args.get_value("name")?;
    let atype: String = args.get_value("atype")?;
    let child = ctx.registry.create(&atype, &name)?;
    target.add_child(child)?;
    Ok(None)
}

fn delete_component(
    target: &mut Component,
    args: &Map,
    _: &SignalContext<'_>,
) -> anyhow::Result<Option<Map>> {
    let name: String = args.get_value("name")?;
    target.remove_child(&name)?;
    Ok(None)
}

fn rename_component(
    target: &mut Component,
    args: &Map,
    _: &SignalContext<'_>,
) -> anyhow::Result<Option<Map>> {
    let name: String = args.get_value("name")?;
    let new_name: String = args.get_value("new_name")?;
    target.rename_child(&name, &new_name)?;
    Ok(None)
}

fn list_tree(target: &mut Component, _: &Map, ctx: &SignalContext<'_>) -> anyhow::Result<Option<Map>> {
    let mut reply = Map::new();
    reply.set_subtree(TREE_KEY, target.snapshot(ctx.delimiter)?)?;
    Ok(Some(reply))
}

fn list_content(
    target: &mut Component,
    _: &Map,
    ctx: &SignalContext<'_>,
) -> anyhow::Result<Option<Map>> {
    Ok(Some(target.options().to_map(ctx.delimiter)?))
}

fn signal_signature(
    target: &mut Component,
    args: &Map,
    ctx: &SignalContext<'_>,
) -> anyhow::Result<Option<Map>> {
    let name: String = args.get_value("name")?;
    Ok(Some(target.request_signature(&name, ctx.delimiter)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{variants, BuilderRegistry};
    use crate::error::Error;
    use crate::xml::XmlNode;

    fn registry() -> BuilderRegistry {
        let mut registry = BuilderRegistry::new();
        variants::register_core_builders(&mut registry);
        registry
    }

    #[test]
    fn test_every_component_has_builtins() {
        let c = Component::new("x", "Group");
        assert_eq!(c.signals().names(false), vec!["configure", "create_component", "delete_component", "rename_component"]);
        assert_eq!(c.signals().len(), 7);
    }

    #[test]
    fn test_create_rename_delete() {
        let registry = registry();
        let ctx = SignalContext::local(&registry);
        let mut root = variants::root("Root");

        let mut args = Map::new();
        args.set_value("name", String::from("mesh")).unwrap();
        args.set_value("atype", String::from("Group")).unwrap();
        root.call_signal("create_component", &args, &ctx).unwrap();
        assert_eq!(root.child("mesh").unwrap().type_name(), "Group");

        let mut args = Map::new();
        args.set_value("name", String::from("mesh")).unwrap();
        args.set_value("new_name", String::from("grid")).unwrap();
        root.call_signal("rename_component", &args, &ctx).unwrap();
        assert!(root.child("grid").is_some());

        let mut args = Map::new();
        args.set_value("name", String::from("grid")).unwrap();
        root.call_signal("delete_component", &args, &ctx).unwrap();
        assert_eq!(root.count_children(), 0);
    }

    #[test]
    fn test_create_unknown_type_fails_at_boundary() {
        let registry = registry();
        let ctx = SignalContext::local(&registry);
        let mut root = variants::root("Root");
        let mut args = Map::new();
        args.set_value("name", String::from("x")).unwrap();
        args.set_value("atype", String::from("UnknownType")).unwrap();
        let err = root.call_signal("create_component", &args, &ctx).unwrap_err();
        match err {
            Error::DispatchFailure { signal, message } => {
                assert_eq!(signal, "create_component");
                assert!(message.contains("UnknownType"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_list_tree_and_signature_replies() {
        let registry = registry();
        let ctx = SignalContext::local(&registry);
        let mut root = variants::root("Root");
        root.add_child(variants::group("mesh")).unwrap();

        let reply = root.call_signal("list_tree", &Map::new(), &ctx).unwrap().unwrap();
        let tree: &XmlNode = reply.subtree("tree").unwrap();
        assert_eq!(tree.attr("name"), Some("Root"));
        assert_eq!(tree.children_named("node").count(), 1);

        let mut args = Map::new();
        args.set_value("name", String::from("rename_component")).unwrap();
        let sig = root.call_signal("signal_signature", &args, &ctx).unwrap().unwrap();
        assert_eq!(sig.keys(), vec!["name", "new_name"]);
    }
}
