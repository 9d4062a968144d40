// ABOUTME: Resolves raw reference specifiers to first-party module identifiers.
// ABOUTME: Relative forms resolve against the source namespace, absolute ones by suffix.
use archgraph_core::{module_namespace, Language, ModuleId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Lookup tables over the module identifiers of one snapshot.
pub struct Resolver {
    known: BTreeSet<ModuleId>,
    /// Every dotted suffix of every identifier, mapped to the identifiers
    /// ending in it.
    suffixes: HashMap<String, Vec<ModuleId>>,
    /// Go package directories (`a/b`) to the modules they contain.
    packages: BTreeMap<String, Vec<ModuleId>>,
}

impl Resolver {
    pub fn new<'a>(modules: impl IntoIterator<Item = (&'a ModuleId, Language)>) -> Self {
        let mut known = BTreeSet::new();
        let mut suffixes: HashMap<String, Vec<ModuleId>> = HashMap::new();
        let mut packages: BTreeMap<String, Vec<ModuleId>> = BTreeMap::new();

        for (id, language) in modules {
            let segments: Vec<&str> = id.segments().collect();
            for start in 0..segments.len() {
                suffixes
                    .entry(segments[start..].join("."))
                    .or_default()
                    .push(id.clone());
            }
            if language == Language::Go {
                let dir = segments[..segments.len().saturating_sub(1)].join("/");
                packages.entry(dir).or_default().push(id.clone());
            }
            known.insert(id.clone());
        }
        for candidates in suffixes.values_mut() {
            candidates.sort_by(|a, b| {
                a.segments()
                    .count()
                    .cmp(&b.segments().count())
                    .then_with(|| a.cmp(b))
            });
        }
        for members in packages.values_mut() {
            members.sort();
        }

        Self {
            known,
            suffixes,
            packages,
        }
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.known.contains(id)
    }

    /// Modules a reference written in `path` points at. Empty when the
    /// target is not first-party.
    pub fn resolve(&self, path: &str, language: Language, specifier: &str) -> Vec<ModuleId> {
        let namespace = module_namespace(path, language);
        match language {
            Language::Rust => self.resolve_rust(&namespace, specifier),
            Language::Python => self.resolve_python(&namespace, specifier),
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                self.resolve_ecmascript(&namespace, specifier)
            }
            Language::Go => self.resolve_go(specifier),
        }
    }

    fn resolve_rust(&self, namespace: &[String], specifier: &str) -> Vec<ModuleId> {
        let mut parts: Vec<&str> = specifier.split("::").filter(|s| !s.is_empty()).collect();
        match parts.first().copied() {
            Some("crate") => {
                parts.remove(0);
                self.absolute(&parts)
            }
            Some("self") | Some("super") => {
                let mut base = namespace.to_vec();
                let mut rest = parts.as_slice();
                while let Some((head, tail)) = rest.split_first() {
                    match *head {
                        "self" => {}
                        "super" => {
                            base.pop();
                        }
                        _ => break,
                    }
                    rest = tail;
                }
                self.relative(&base, rest)
            }
            Some(_) => self.absolute(&parts),
            None => Vec::new(),
        }
    }

    fn resolve_python(&self, namespace: &[String], specifier: &str) -> Vec<ModuleId> {
        let dots = specifier.chars().take_while(|c| *c == '.').count();
        let rest: Vec<&str> = specifier[dots..]
            .split('.')
            .filter(|s| !s.is_empty())
            .collect();
        if dots == 0 {
            return self.absolute(&rest);
        }
        let mut base = namespace.to_vec();
        for _ in 1..dots {
            if base.pop().is_none() {
                return Vec::new();
            }
        }
        self.relative(&base, &rest)
    }

    fn resolve_ecmascript(&self, namespace: &[String], specifier: &str) -> Vec<ModuleId> {
        let is_relative = specifier.starts_with("./") || specifier.starts_with("../");
        let mut segments: Vec<String> = if is_relative {
            namespace.to_vec()
        } else {
            Vec::new()
        };
        for part in specifier.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Vec::new();
                    }
                }
                other => segments.push(other.to_string()),
            }
        }
        if let Some(last) = segments.pop() {
            let stem = strip_script_extension(&last);
            if stem != "index" || segments.is_empty() {
                segments.push(stem.to_string());
            }
        }

        let parts: Vec<&str> = segments.iter().map(String::as_str).collect();
        if is_relative {
            self.relative(&[], &parts)
        } else {
            self.absolute(&parts)
        }
    }

    /// Longest suffix of the import path that names a known package
    /// directory; every module of that package is a target.
    fn resolve_go(&self, specifier: &str) -> Vec<ModuleId> {
        let parts: Vec<&str> = specifier.split('/').filter(|s| !s.is_empty()).collect();
        for start in 0..parts.len() {
            if let Some(members) = self.packages.get(&parts[start..].join("/")) {
                return members.clone();
            }
        }
        Vec::new()
    }

    /// Exact identifiers only, dropping trailing segments down to `base`.
    fn relative(&self, base: &[String], rest: &[&str]) -> Vec<ModuleId> {
        let mut full: Vec<&str> = base.iter().map(String::as_str).collect();
        let floor = full.len().max(1);
        full.extend_from_slice(rest);
        let mut len = full.len();
        while len >= floor {
            let id = ModuleId::new(full[..len].join("."));
            if self.known.contains(&id) {
                return vec![id];
            }
            len -= 1;
        }
        Vec::new()
    }

    /// Shortest identifier ending in the specifier, dropping trailing
    /// segments one at a time.
    fn absolute(&self, parts: &[&str]) -> Vec<ModuleId> {
        let mut len = parts.len();
        while len > 0 {
            if let Some(best) = self
                .suffixes
                .get(&parts[..len].join("."))
                .and_then(|c| c.first())
            {
                return vec![best.clone()];
            }
            len -= 1;
        }
        Vec::new()
    }
}

fn strip_script_extension(name: &str) -> &str {
    const EXTENSIONS: &[&str] = &[".js", ".jsx", ".mjs", ".cjs", ".ts", ".tsx", ".mts", ".cts"];
    EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(ids: &[(&str, Language)]) -> Resolver {
        let ids: Vec<(ModuleId, Language)> = ids
            .iter()
            .map(|(id, lang)| (ModuleId::new(*id), *lang))
            .collect();
        Resolver::new(ids.iter().map(|(id, lang)| (id, *lang)))
    }

    fn ids(found: Vec<ModuleId>) -> Vec<String> {
        found.into_iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn python_relative_and_absolute() {
        let r = resolver(&[
            ("pkg", Language::Python),
            ("pkg.util", Language::Python),
            ("pkg.sub.store", Language::Python),
            ("tools.os", Language::Python),
        ]);
        let at = "pkg/sub/store.py";
        assert_eq!(ids(r.resolve(at, Language::Python, "..util")), vec!["pkg.util"]);
        assert_eq!(ids(r.resolve(at, Language::Python, "..util.load")), vec!["pkg.util"]);
        assert_eq!(ids(r.resolve(at, Language::Python, "pkg.util.Base")), vec!["pkg.util"]);
        assert_eq!(ids(r.resolve(at, Language::Python, "sys")), Vec::<String>::new());
        assert_eq!(ids(r.resolve(at, Language::Python, "....x")), Vec::<String>::new());
    }

    #[test]
    fn rust_paths() {
        let r = resolver(&[
            ("src.lib", Language::Rust),
            ("src.graph", Language::Rust),
            ("src.graph.builder", Language::Rust),
            ("src.cache", Language::Rust),
        ]);
        assert_eq!(
            ids(r.resolve("src/graph/mod.rs", Language::Rust, "self::builder")),
            vec!["src.graph.builder"]
        );
        assert_eq!(
            ids(r.resolve("src/graph/builder.rs", Language::Rust, "super::super::cache::Entry")),
            vec!["src.cache"]
        );
        assert_eq!(
            ids(r.resolve("src/lib.rs", Language::Rust, "crate::graph::builder::build")),
            vec!["src.graph.builder"]
        );
        assert!(r
            .resolve("src/lib.rs", Language::Rust, "std::collections::HashMap")
            .is_empty());
    }

    #[test]
    fn ecmascript_relative_specifiers() {
        let r = resolver(&[
            ("web.repo", Language::TypeScript),
            ("web.components", Language::TypeScript),
            ("log", Language::TypeScript),
        ]);
        let at = "web/service.ts";
        assert_eq!(ids(r.resolve(at, Language::TypeScript, "./repo")), vec!["web.repo"]);
        assert_eq!(ids(r.resolve(at, Language::TypeScript, "./repo.js")), vec!["web.repo"]);
        assert_eq!(
            ids(r.resolve(at, Language::TypeScript, "./components/index")),
            vec!["web.components"]
        );
        assert_eq!(ids(r.resolve(at, Language::TypeScript, "../log")), vec!["log"]);
        assert!(r.resolve(at, Language::TypeScript, "../../x").is_empty());
        assert!(r.resolve(at, Language::TypeScript, "react").is_empty());
    }

    #[test]
    fn go_packages_match_every_member() {
        let r = resolver(&[
            ("store.db", Language::Go),
            ("store.cache", Language::Go),
            ("api.server", Language::Go),
        ]);
        assert_eq!(
            ids(r.resolve("api/server.go", Language::Go, "github.com/acme/app/store")),
            vec!["store.cache", "store.db"]
        );
        assert!(r.resolve("api/server.go", Language::Go, "fmt").is_empty());
    }

    #[test]
    fn shortest_suffix_wins() {
        let r = resolver(&[
            ("a.b.util", Language::Python),
            ("b.util", Language::Python),
        ]);
        assert_eq!(ids(r.resolve("x.py", Language::Python, "util")), vec!["b.util"]);
    }
}
