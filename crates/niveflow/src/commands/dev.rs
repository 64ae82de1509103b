//! Dev server command.

use std::sync::Arc;

use anyhow::{bail, Result};
use niveflow_server::{DevServer, DevServerConfig, Orchestrator};
use niveflow_static::{BuildDispatcher, NativeBundler};
use niveflow_sync::SourceDescriptor;

use crate::config::Config;

/// Preview output never overwrites a configured destination.
const DEV_OUTPUT_ROOT: &str = ".niveflow/dev";

pub async fn run(config: &Config, name: Option<String>, port: u16, open: bool) -> Result<()> {
    let source = pick_source(&config.sources, name.as_deref())?;
    tracing::info!("Previewing '{}' [{}]", source.name, source.kind_label());

    let mut dispatch = config.dispatch_config()?;
    dispatch.output_root = dispatch.cwd.join(DEV_OUTPUT_ROOT);
    let dispatcher = BuildDispatcher::new(
        dispatch,
        Arc::new(NativeBundler::new(&config.build.base_url)),
    );

    let orchestrator = Orchestrator::new(vec![source], config.synchronizer(), dispatcher);

    let server = DevServer::new(
        DevServerConfig {
            port,
            open,
            ..Default::default()
        },
        Arc::new(orchestrator),
    );
    server.start().await?;

    Ok(())
}

/// The named source (or the first one), without its output override.
fn pick_source(sources: &[SourceDescriptor], name: Option<&str>) -> Result<SourceDescriptor> {
    let source = match name {
        Some(name) => sources.iter().find(|s| s.name == name).ok_or_else(|| {
            let available: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
            anyhow::anyhow!(
                "Unknown source '{}'. Available: {}",
                name,
                available.join(", ")
            )
        })?,
        None => match sources.first() {
            Some(source) => source,
            None => bail!("No sources configured. Add [[sources]] to niveflow.toml."),
        },
    };

    let mut source = source.clone();
    source.output_path = None;
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sources() -> Vec<SourceDescriptor> {
        vec![
            SourceDescriptor::local("guide", "./guide").with_output("/var/www/guide"),
            SourceDescriptor::remote("api", "https://example.com/api.git"),
        ]
    }

    #[test]
    fn picks_first_source_by_default() {
        let source = pick_source(&sources(), None).unwrap();

        assert_eq!(source.name, "guide");
        assert_eq!(source.output_path, None);
    }

    #[test]
    fn picks_named_source() {
        assert_eq!(pick_source(&sources(), Some("api")).unwrap().name, "api");
    }

    #[test]
    fn unknown_or_missing_sources_fail() {
        let err = pick_source(&sources(), Some("nope")).unwrap_err();
        assert!(err.to_string().contains("guide, api"));

        assert!(pick_source(&[], None).is_err());
    }
}
