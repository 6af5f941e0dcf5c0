//! Projection of the tool catalog into script identifiers.
//!
//! Manual names become module paths (`acme.billing` -> `acme::billing`) and
//! tools become functions inside them. Names that are not valid identifiers
//! are sanitized, and sanitized names that collide are disambiguated in
//! catalog order with `_2`, `_3`, ... suffixes.

use std::sync::Arc;

use bridge_primitives::{NAMESPACE_SEPARATOR, Tool};

const RESERVED: &[&str] = &[
    "as", "async", "await", "break", "call", "case", "catch", "const", "continue", "curry",
    "debug", "default", "do", "else", "eval", "exit", "export", "false", "fn", "for", "global",
    "go", "goto", "if", "import", "in", "is", "is_def_fn", "is_def_var", "is_shared", "let",
    "loop", "match", "module", "new", "nil", "null", "package", "print", "private", "protected",
    "public", "return", "shared", "spawn", "static", "super", "switch", "sync", "this", "thread",
    "throw", "true", "try", "type_of", "until", "use", "var", "void", "while", "with", "yield",
    "Fn",
];

/// Turns an arbitrary name into a script identifier.
#[must_use]
pub fn sanitize_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RESERVED.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// A module in the projected namespace.
#[derive(Debug, Default)]
pub struct NamespaceNode {
    modules: Vec<(String, String, NamespaceNode)>,
    functions: Vec<(String, Arc<Tool>)>,
}

impl NamespaceNode {
    /// Builds the namespace tree for `tools`, given in catalog order.
    #[must_use]
    pub fn from_tools<'a, I>(tools: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<Tool>>,
    {
        let mut root = Self::default();
        for tool in tools {
            let node = tool
                .manual()
                .split(NAMESPACE_SEPARATOR)
                .fold(&mut root, NamespaceNode::module_mut);
            node.add_function(tool);
        }
        root
    }

    /// Sub-modules as `(identifier, node)` pairs, in catalog order.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &NamespaceNode)> {
        self.modules
            .iter()
            .map(|(_, ident, node)| (ident.as_str(), node))
    }

    /// Functions as `(identifier, tool)` pairs, in catalog order.
    pub fn functions(&self) -> impl Iterator<Item = (&str, &Arc<Tool>)> {
        self.functions.iter().map(|(ident, tool)| (ident.as_str(), tool))
    }

    fn module_mut<'a>(&'a mut self, segment: &str) -> &'a mut NamespaceNode {
        let position = match self.modules.iter().position(|(raw, _, _)| raw == segment) {
            Some(position) => position,
            None => {
                let ident = unique(
                    sanitize_identifier(segment),
                    self.modules.iter().map(|(_, ident, _)| ident.as_str()),
                );
                self.modules
                    .push((segment.to_owned(), ident, NamespaceNode::default()));
                self.modules.len() - 1
            }
        };
        &mut self.modules[position].2
    }

    fn add_function(&mut self, tool: &Arc<Tool>) {
        let ident = unique(
            sanitize_identifier(tool.local_name()),
            self.functions.iter().map(|(ident, _)| ident.as_str()),
        );
        self.functions.push((ident, Arc::clone(tool)));
    }
}

fn unique<'a>(base: String, taken: impl Iterator<Item = &'a str> + Clone) -> String {
    if !taken.clone().any(|ident| ident == base) {
        return base;
    }
    (2_usize..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !taken.clone().any(|ident| ident == candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_primitives::{CallTemplate, Manual, ManualName, ToolDescriptor};

    fn tools(manual: &str, names: &[&str]) -> Vec<Arc<Tool>> {
        Manual::builder(ManualName::new(manual).unwrap(), CallTemplate::new("text"))
            .tools(names.iter().map(|name| ToolDescriptor::new(*name)))
            .unwrap()
            .build()
            .tools()
            .to_vec()
    }

    fn lookup<'a>(root: &'a NamespaceNode, path: &str) -> Option<&'a Arc<Tool>> {
        let mut segments: Vec<&str> = path.split("::").collect();
        let function = segments.pop()?;
        let mut node = root;
        for segment in segments {
            node = node
                .modules()
                .find(|(ident, _)| *ident == segment)
                .map(|(_, child)| child)?;
        }
        node.functions()
            .find(|(ident, _)| *ident == function)
            .map(|(_, tool)| tool)
    }

    #[test]
    fn sanitizes_identifiers() {
        assert_eq!(sanitize_identifier("get-forecast"), "get_forecast");
        assert_eq!(sanitize_identifier("2fa"), "_2fa");
        assert_eq!(sanitize_identifier("import"), "import_");
        assert_eq!(sanitize_identifier("print"), "print_");
        assert_eq!(sanitize_identifier(""), "_");
        assert_eq!(sanitize_identifier("ok_name"), "ok_name");
    }

    #[test]
    fn nests_dotted_manual_names() {
        let mut catalog = tools("acme.billing", &["charge"]);
        catalog.extend(tools("acme", &["ping"]));
        let root = NamespaceNode::from_tools(&catalog);

        assert_eq!(lookup(&root, "acme::billing::charge").unwrap().name(), "acme.billing.charge");
        assert_eq!(lookup(&root, "acme::ping").unwrap().name(), "acme.ping");
        assert!(lookup(&root, "acme::charge").is_none());
        assert_eq!(root.modules().count(), 1);
    }

    #[test]
    fn collisions_are_suffixed_in_catalog_order() {
        let mut catalog = tools("my-api", &["get-user", "get_user"]);
        catalog.extend(tools("my_api", &["status"]));
        let root = NamespaceNode::from_tools(&catalog);

        assert_eq!(lookup(&root, "my_api::get_user").unwrap().name(), "my-api.get-user");
        assert_eq!(lookup(&root, "my_api::get_user_2").unwrap().name(), "my-api.get_user");
        assert_eq!(lookup(&root, "my_api_2::status").unwrap().name(), "my_api.status");
    }
}
