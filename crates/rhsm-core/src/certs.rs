//! Product certificate discovery and replacement

use crate::context::IsolatedActions;
use crate::error::{FailureKind, TerminalError};
use crate::Result;
use std::path::Path;
use tracing::{debug, info, warn};

/// Directories holding installed product certificates
pub const PRODUCT_CERT_DIRS: [&str; 2] = ["/etc/pki/product", "/etc/pki/product-default"];

fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Full paths of the regular files in each existing certificate directory.
///
/// A directory that does not exist contributes nothing.
pub fn existing_product_certificates(
    context: &dyn IsolatedActions,
    dirs: &[String],
) -> Result<Vec<String>> {
    let mut certs = Vec::new();
    for dir in dirs {
        if !context.is_dir(dir) {
            debug!(dir = %dir, "certificate directory does not exist");
            continue;
        }
        let names = context.list_files(dir).map_err(|err| {
            TerminalError::new(
                FailureKind::Execution,
                format!("Unable to list product certificates in {}: {}", dir, err),
            )
            .with_hint(format!("Please ensure {} is readable.", dir))
        })?;
        certs.extend(names.iter().map(|name| join(dir, name)));
    }
    Ok(certs)
}

/// Replace the installed product certificates with `cert_path`.
///
/// Every path in `existing` is removed first; a failed removal is logged and
/// skipped. The new certificate is then copied, under its own file name,
/// into each of `dirs` that exists in the context.
pub fn switch_certificate(
    context: &dyn IsolatedActions,
    existing: &[String],
    cert_path: &Path,
    dirs: &[String],
) -> Result<()> {
    let file_name = cert_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            TerminalError::new(
                FailureKind::Execution,
                format!("Invalid product certificate path: {}", cert_path.display()),
            )
            .with_hint("Please pass the path to a product certificate file.")
        })?;

    for path in existing {
        if let Err(err) = context.remove(path) {
            warn!(path = %path, error = %err, "Failed to remove existing certificate: {}", path);
        }
    }

    for dir in dirs {
        if !context.is_dir(dir) {
            continue;
        }
        let dest = join(dir, &file_name);
        context.copy_to(cert_path, &dest).map_err(|err| {
            TerminalError::new(
                FailureKind::Execution,
                format!("Unable to install product certificate {}: {}", dest, err),
            )
            .with_hint(format!("Please ensure {} is writable.", dir))
        })?;
        info!(dest = %dest, "installed product certificate");
    }

    Ok(())
}
