//! View-layer output of the committed path.

use crate::core::{Locals, Path, ViewDeclaration};
use crate::params::Params;

/// What one view slot of one active state should render.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewConfig {
    /// State declaring the view
    pub state: String,
    /// Fully qualified slot, `name@parent` unless declared with an `@`
    pub view: String,
    pub declaration: ViewDeclaration,
    /// Params of the path down to the declaring state
    pub params: Params,
    /// Resolved values visible from the declaring state
    pub locals: Locals,
}

/// View configs for every view of every node on `path`, shallowest first.
pub(crate) fn view_configs(path: &Path) -> Vec<ViewConfig> {
    let mut configs = Vec::new();
    let mut params = Params::new();
    let mut locals = Locals::new();

    for node in path.nodes() {
        params.extend(node.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        locals.extend(node.locals.iter().map(|(k, v)| (k.clone(), v.clone())));
        let parent = node.state.parent().map_or("", |p| p.name());

        for (slot, declaration) in node.state.views() {
            let view = if slot.contains('@') {
                slot.clone()
            } else {
                format!("{slot}@{parent}")
            };
            configs.push(ViewConfig {
                state: node.state.name().to_string(),
                view,
                declaration: declaration.clone(),
                params: params.clone(),
                locals: locals.clone(),
            });
        }
    }
    configs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateBuilder;
    use crate::core::{StateRegistry, DEFAULT_VIEW};
    use crate::params;
    use serde_json::json;

    #[test]
    fn slots_are_qualified_by_parent() {
        let mut registry = StateRegistry::default();
        registry
            .register(StateBuilder::new("app").url("/app").component("App").build())
            .unwrap();
        registry
            .register(
                StateBuilder::new("app.item")
                    .url("/:id")
                    .component("Item")
                    .view("sidebar@app", ViewDeclaration::template("<nav/>"))
                    .build(),
            )
            .unwrap();

        let leaf = registry.get("app.item").unwrap();
        let mut path = Path::build(registry.path(&leaf), &params! { "id" => "9" });
        path.nodes_mut()[1].locals.insert("user".into(), json!("ann"));

        let configs = view_configs(&path);
        let slots: Vec<&str> = configs.iter().map(|c| c.view.as_str()).collect();
        assert_eq!(slots, [format!("{DEFAULT_VIEW}@"), format!("{DEFAULT_VIEW}@app"), "sidebar@app".to_string()]);

        let item = &configs[1];
        assert_eq!(item.state, "app.item");
        assert_eq!(item.params["id"], "9");
        assert_eq!(item.locals["user"], "ann");
        assert!(configs[0].params.is_empty());
    }
}
