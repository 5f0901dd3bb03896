use super::Host;
use super::config::Config;
use crate::Result;
use camino::Utf8Path;
use std::io::Write;

/// Load and validate a configuration, then list what it defines.
pub fn validate_config<H: Host>(host: &mut H, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    let mut out = host.output();
    match config_path {
        Some(path) => {
            let _ = writeln!(out, "Configuration file '{path}' is valid");
        }
        None => {
            let _ = writeln!(out, "Built-in configuration is valid");
        }
    }

    for (id, repo) in &config.repositories {
        let _ = writeln!(out, "  {id:<20} {:<30} {}", repo.repo, repo.parser);
    }

    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;
    use camino::Utf8PathBuf;

    #[test]
    fn lists_builtin_repositories() {
        let mut host = TestHost::new();
        validate_config(&mut host, None).unwrap();

        let out = String::from_utf8_lossy(&host.output_buf);
        assert!(out.starts_with("Built-in configuration is valid"));
        assert!(out.contains("prebid/prebid-server-java"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn rejects_invalid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("bad.toml")).unwrap();
        std::fs::write(&path, "[repositories.x]\nrepo = \"nope\"\n").unwrap();

        let mut host = TestHost::new();
        assert!(validate_config(&mut host, Some(&path)).is_err());
    }
}
