// # Resolver Configuration Writer
//
// Renders the cached servers and domains in resolv.conf(5) syntax and
// publishes the result atomically.
//
// ## File Format
//
// ```text
// search example.com corp.example.net
// nameserver 2001:db8::53
// nameserver fe80::1%eth0
// ```
//
// ## Atomicity
//
// The document is written to `<path>.tmp` and renamed over `<path>`. Readers
// see either the previous file or the new one, never a partial write. If the
// temporary file cannot be written the published file is left untouched.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::cache::{DomainEntry, ExpiringTable, ServerEntry};
use crate::error::{Error, Result};

/// Render the resolver configuration document
///
/// # Parameters
///
/// - `servers`: Cached servers, written in table order
/// - `domains`: Cached search domains; the `search` line is omitted if empty
/// - `interface_name`: Resolves the scope of link-local servers. Servers whose
///   interface no longer resolves are left out.
pub fn render<F>(
    servers: &ExpiringTable<ServerEntry>,
    domains: &ExpiringTable<DomainEntry>,
    interface_name: F,
) -> String
where
    F: Fn(u32) -> Option<String>,
{
    let mut doc = String::new();

    if !domains.is_empty() {
        doc.push_str("search");
        for domain in domains {
            doc.push(' ');
            doc.push_str(&domain.name);
        }
        doc.push('\n');
    }

    for server in servers {
        if server.is_link_local() {
            match interface_name(server.ifindex) {
                Some(iface) => {
                    let _ = writeln!(doc, "nameserver {}%{}", server.addr, iface);
                }
                None => {
                    tracing::debug!(
                        "Interface {} of {} is gone, omitting it",
                        server.ifindex,
                        server.addr
                    );
                }
            }
        } else {
            let _ = writeln!(doc, "nameserver {}", server.addr);
        }
    }

    doc
}

/// Publishes rendered documents to the resolver configuration path
#[derive(Debug, Clone)]
pub struct ResolvWriter {
    path: PathBuf,
}

impl ResolvWriter {
    /// Create a writer for the given resolver configuration path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the published file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the published file with `document`
    pub async fn publish(&self, document: &str) -> Result<()> {
        let temp_path = self.temp_path();

        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::config_write(format!("cannot create {}: {}", temp_path.display(), e))
            })?;

            let written = async {
                file.write_all(document.as_bytes()).await?;
                file.flush().await?;
                file.sync_all().await
            }
            .await;

            if let Err(e) = written {
                let _ = fs::remove_file(&temp_path).await;
                return Err(Error::config_write(format!(
                    "cannot write {}: {}",
                    temp_path.display(),
                    e
                )));
            }
        }

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::config_write(format!(
                "cannot rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )));
        }

        tracing::trace!("Resolver configuration written to {}", self.path.display());
        Ok(())
    }

    /// `<path>.tmp`, next to the published file so the rename stays on one filesystem
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
