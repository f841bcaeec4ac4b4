//! Turns a recognized construct into a documentation URL or a local file to open.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::constraint::{Strategy, resolve_version};
use crate::context::{find_block_attribute, match_declaration, variable_context};
use crate::lockfile::{Lockfile, ProviderSource};
use crate::registry::{LatestVersionCache, LatestVersionSource};
use crate::semver::Version;
use crate::types::{Declaration, DocTarget, Document, ModuleReference, Position, ResourceReference};

/// Host of the public registry when written out in a module source.
const PUBLIC_REGISTRY_HOST: &str = "registry.terraform.io";

/// Version segment used when no exact version is known.
const LATEST: &str = "latest";

/// Where a module's `source` points. Every resolvable source is exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    /// `./path`, `../path`, or an absolute path.
    Local(PathBuf),
    /// A private registry at `host/namespace/name/provider`.
    Private {
        /// Registry hostname.
        host: String,
        /// Module name.
        name: String,
        /// Organization or namespace.
        namespace: String,
        /// Target provider.
        provider: String,
    },
    /// The public registry at `namespace/name/provider`.
    Public {
        /// Module name.
        name: String,
        /// Publishing namespace.
        namespace: String,
        /// Target provider.
        provider: String,
    },
}

impl ModuleSource {
    /// Classify a raw `source` value. Git, HTTP, archive, and other
    /// non-registry sources are `None`.
    pub fn classify(source: &str) -> Option<Self> {
        let source = source.trim();
        let is_local = source == "." || source == ".."
            || ["./", "../", "/"].iter().any(|prefix| return source.starts_with(prefix));
        if is_local {
            return Some(ModuleSource::Local(PathBuf::from(source)));
        }
        if source.contains("::") || source.contains("://") || source.contains('?') {
            return None;
        }

        // `ns/name/provider//modules/sub` addresses a subdirectory of the same module.
        let package = source.split_once("//").map_or(source, |(package, _)| return package);
        let segments: Vec<&str> = package.split('/').collect();
        if segments.iter().any(|s| return s.is_empty()) {
            return None;
        }

        return match segments.as_slice() {
            [namespace, name, provider] if !namespace.contains('.') => Some(ModuleSource::Public {
                name: (*name).to_string(),
                namespace: (*namespace).to_string(),
                provider: (*provider).to_string(),
            }),
            [host, namespace, name, provider] if *host == PUBLIC_REGISTRY_HOST => Some(ModuleSource::Public {
                name: (*name).to_string(),
                namespace: (*namespace).to_string(),
                provider: (*provider).to_string(),
            }),
            [host, namespace, name, provider] if host.contains('.') => Some(ModuleSource::Private {
                host: (*host).to_string(),
                name: (*name).to_string(),
                namespace: (*namespace).to_string(),
                provider: (*provider).to_string(),
            }),
            _ => None,
        };
    }
}

/// Optional latest-version substitution: the cache and what fills it.
#[derive(Clone, Copy)]
pub struct LatestLookup<'a> {
    /// Cache of successful lookups.
    pub cache: &'a LatestVersionCache,
    /// Where misses are fetched from.
    pub source: &'a dyn LatestVersionSource,
}

/// Everything a lookup needs besides the document.
#[derive(Clone, Copy)]
pub struct LookupContext<'a> {
    /// Latest-version substitution, if enabled.
    pub latest: Option<LatestLookup<'a>>,
    /// Provider locks for the document's configuration, if any.
    pub lockfile: Option<&'a Lockfile>,
    /// Public registry base URL.
    pub registry_url: &'a str,
    /// How to choose among constraint versions.
    pub strategy: &'a Strategy,
}

/// One navigable declaration in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentLink {
    /// Configuration address of the declaration.
    pub address: String,
    /// One-based line of the declaration.
    pub line: usize,
    /// Where the link goes.
    pub target: DocTarget,
}

/// Resolve what the cursor at `position` points at.
///
/// A declaration line links to its resource, data source, or module. An
/// attribute inside a resource links to that attribute's section of the
/// resource page. The `source` attribute of a module links to the module.
pub fn resolve_target(
    document: &Document,
    document_path: &Path,
    position: Position,
    ctx: &LookupContext<'_>,
) -> Option<DocTarget> {
    let line = document.line(position.line)?;
    if let Some(declaration) = match_declaration(line) {
        return declaration_target(document, document_path, position.line, &declaration, ctx);
    }

    let (block, variable) = variable_context(document, position)?;
    return match &block.declaration {
        Declaration::Resource(reference) => {
            let fragment = variable.hash_fragment();
            Some(resource_target(reference, Some(&fragment), ctx))
        },
        Declaration::Module { .. } if variable.name == "source" && variable.nesting_level == 0 => {
            declaration_target(document, document_path, block.declaration_line, &block.declaration, ctx)
        },
        Declaration::Module { .. } => None,
    };
}

/// Every declaration in the document that resolves to a target.
pub fn document_links(document: &Document, document_path: &Path, ctx: &LookupContext<'_>) -> Vec<DocumentLink> {
    let mut links = Vec::new();
    for index in 0..document.line_count() {
        let Some(declaration) = document.line(index).and_then(match_declaration) else {
            continue;
        };
        let Some(target) = declaration_target(document, document_path, index, &declaration, ctx) else {
            continue;
        };
        links.push(DocumentLink {
            address: declaration.address(),
            line: index.saturating_add(1),
            target,
        });
    }
    return links;
}

/// Registry page for a provider resource or data source.
pub fn provider_docs_url(
    registry_url: &str,
    provider: &ProviderSource,
    version: &str,
    reference: &ResourceReference,
    fragment: Option<&str>,
) -> String {
    let mut url = format!(
        "{registry_url}/providers/{}/{}/{version}/docs/{}/{}",
        provider.namespace,
        provider.name,
        reference.kind.docs_category(),
        reference.type_suffix,
    );
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    return url;
}

/// Provider identity and the version to show for a resource's provider prefix.
///
/// Without a lock entry the provider is assumed to be `hashicorp/<prefix>`
/// and its latest docs are used.
pub fn provider_version(prefix: &str, ctx: &LookupContext<'_>) -> (ProviderSource, String) {
    let Some(lock) = ctx.lockfile.and_then(|l| return l.provider_named(prefix)) else {
        tracing::debug!(prefix, "provider not locked, using latest docs");
        let source = ProviderSource {
            name: prefix.to_string(),
            namespace: "hashicorp".to_string(),
        };
        return (source, LATEST.to_string());
    };
    let Some(locked) = lock.version.as_deref() else {
        return (lock.source.clone(), LATEST.to_string());
    };

    let resolved = resolve_version(locked, lock.constraints.as_deref(), ctx.strategy);
    tracing::debug!(provider = %lock.source, locked, %resolved, strategy = %ctx.strategy, "resolved provider version");

    if let Some(latest) = ctx.latest
        && latest.cache.is_latest_known(&lock.source, &resolved, latest.source)
    {
        return (lock.source.clone(), LATEST.to_string());
    }
    return (lock.source.clone(), resolved);
}

/// Target of a module, or `None` for sources that aren't local paths or
/// registry addresses. Local paths are relative to the declaring document.
pub fn module_target(document_path: &Path, module: &ModuleReference, version: Option<&str>, registry_url: &str) -> Option<DocTarget> {
    let exact_version = version.filter(|v| return Version::parse(v).is_some());

    return match ModuleSource::classify(&module.source)? {
        ModuleSource::Local(path) => {
            let base = document_path.parent().unwrap_or(Path::new(""));
            let joined = normalize_path(&base.join(path));
            let entry = joined.join("main.tf");
            let path = if entry.is_file() { entry } else { joined };
            Some(DocTarget::Navigate { path })
        },
        ModuleSource::Public { name, namespace, provider } => Some(DocTarget::Url {
            url: format!(
                "{registry_url}/modules/{namespace}/{name}/{provider}/{}",
                exact_version.unwrap_or(LATEST)
            ),
        }),
        ModuleSource::Private { host, name, namespace, provider } => {
            let mut url = format!("https://{host}/app/{namespace}/registry/modules/private/{namespace}/{name}/{provider}");
            if let Some(version) = exact_version {
                url.push('/');
                url.push_str(version);
            }
            Some(DocTarget::Url { url })
        },
    };
}

/// Target for a declaration starting on `declaration_line`.
fn declaration_target(
    document: &Document,
    document_path: &Path,
    declaration_line: usize,
    declaration: &Declaration,
    ctx: &LookupContext<'_>,
) -> Option<DocTarget> {
    return match declaration {
        Declaration::Resource(reference) => Some(resource_target(reference, None, ctx)),
        Declaration::Module { local_name } => {
            let module = ModuleReference {
                local_name: local_name.clone(),
                source: find_block_attribute(document, declaration_line, "source")?,
            };
            let version = find_block_attribute(document, declaration_line, "version");
            let target = module_target(document_path, &module, version.as_deref(), ctx.registry_url);
            if target.is_none() {
                tracing::debug!(module = %module.local_name, source = %module.source, "module source not resolvable");
            }
            target
        },
    };
}

/// Documentation URL for a resource, optionally pointing at one attribute.
fn resource_target(reference: &ResourceReference, fragment: Option<&str>, ctx: &LookupContext<'_>) -> DocTarget {
    let (provider, version) = provider_version(&reference.provider_prefix, ctx);
    return DocTarget::Url {
        url: provider_docs_url(ctx.registry_url, &provider, &version, reference, fragment),
    };
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Preserves leading `..` when there is nothing left to pop.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                let can_pop = matches!(components.last(), Some(c) if !matches!(c, Component::ParentDir | Component::RootDir));
                if can_pop {
                    components.pop();
                } else {
                    components.push(component);
                }
            },
            other => components.push(other),
        }
    }
    return components.iter().collect();
}
