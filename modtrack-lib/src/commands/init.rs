use super::Host;
use super::config::Config;
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use ohno::bail;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path
    #[arg(long, short = 'o', value_name = "PATH", default_value = "modtrack.toml")]
    pub output: Utf8PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn init_config<H: Host>(host: &mut H, args: &InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!("'{}' already exists, use --force to overwrite it", args.output);
    }

    Config::save_default(&args.output)?;
    let _ = writeln!(host.output(), "Generated default configuration file: {}", args.output);
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn writes_default_and_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let output = Utf8PathBuf::try_from(tmp.path().join("modtrack.toml")).unwrap();
        let mut host = TestHost::new();

        init_config(&mut host, &InitArgs { output: output.clone(), force: false }).unwrap();
        assert!(String::from_utf8_lossy(&host.output_buf).contains("modtrack.toml"));
        Config::load(Some(&output)).unwrap();

        assert!(init_config(&mut host, &InitArgs { output: output.clone(), force: false }).is_err());
        init_config(&mut host, &InitArgs { output, force: true }).unwrap();
    }
}
