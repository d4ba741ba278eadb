//! Built-in component variants: `Root`, `Group` and `Link`.

use super::{BuilderRegistry, Component};
use crate::constants::TAG_BASIC;
use crate::error::{Error, Result};
use crate::uri::Uri;

/// Type name of the designated tree root.
pub const ROOT_TYPE: &str = "Root";

/// Type name of plain grouping components.
pub const GROUP_TYPE: &str = "Group";

/// Type name of link components.
pub const LINK_TYPE: &str = "Link";

/// Option of a link holding the path it points to.
pub const LINK_TARGET_OPTION: &str = "target";

/// Tree root.
pub fn root(name: &str) -> Component {
    let mut c = Component::new(name, ROOT_TYPE);
    c.add_tag(TAG_BASIC);
    c
}

/// Plain container.
pub fn group(name: &str) -> Component {
    Component::new(name, GROUP_TYPE)
}

/// Link with no target yet.
pub fn link(name: &str) -> Component {
    let mut c = Component::new(name, LINK_TYPE);
    match c
        .options_mut()
        .add_option(LINK_TARGET_OPTION, Uri::default(), "Path of the linked component")
    {
        Ok(option) => {
            option.mark_basic();
        }
        Err(e) => log::error!("Failed to declare link target on [{}]: {}", name, e),
    }
    c
}

/// Link pointing at `target`.
pub fn link_to(name: &str, target: &Uri) -> Result<Component> {
    let mut c = link(name);
    c.options_mut().set_typed(LINK_TARGET_OPTION, target.clone())?;
    Ok(c)
}

/// Resolve what `link` points to, starting from `root`.
///
/// The target path is looked up afresh on every call; relative targets are
/// taken from the link's parent.
pub fn follow<'a>(root: &'a Component, link: &Component) -> Result<&'a Component> {
    if link.type_name() != LINK_TYPE {
        return Err(Error::TypeMismatch {
            key: link.path().to_string(),
            expected: LINK_TYPE.to_string(),
            found: link.type_name().to_string(),
        });
    }
    let target: Uri = link.options().value(LINK_TARGET_OPTION)?;
    if target.segments().is_empty() {
        return Err(Error::not_found(format!("target of link {}", link.path())));
    }
    let absolute = if target.is_absolute() {
        target
    } else {
        link.parent_path().unwrap_or_else(|| link.path()).join(&target)
    };
    root.resolve(&absolute)
}

/// Register the `Root`, `Group` and `Link` builders.
pub fn register_core_builders(registry: &mut BuilderRegistry) {
    registry.register_builder(ROOT_TYPE, root);
    registry.register_builder(GROUP_TYPE, group);
    registry.register_builder(LINK_TYPE, link);
}
