use crate::Result;
use camino::Utf8Path;
use ohno::IntoAppError;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Write `value` as pretty-printed JSON, replacing any existing file.
pub fn write_file<T: Serialize>(value: &T, path: &Utf8Path) -> Result<()> {
    let file = File::create(path).into_app_err_with(|| format!("creating '{path}'"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).into_app_err_with(|| format!("writing JSON report to '{path}'"))?;
    writer.flush().into_app_err_with(|| format!("writing JSON report to '{path}'"))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::compare::{ComparisonRequest, compare};
    use crate::model::{ModuleInfo, Snapshot};

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn comparison_is_tagged_by_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::try_from(tmp.path().join("compare.json")).unwrap();
        let a = Snapshot::new("prebid/Prebid.js", "1.0.0", [ModuleInfo::new("a", "Bid Adapters")]);
        let b = Snapshot::new("prebid/Prebid.js", "2.0.0", [ModuleInfo::new("b", "Bid Adapters")]);
        let result = compare(ComparisonRequest::Versions { source: &a, target: &b }).unwrap();

        write_file(&result, &path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["mode"], "versions");
        assert_eq!(value["categories"]["Bid Adapters"]["added"][0]["name"], "b");
        assert_eq!(value["categories"]["Bid Adapters"]["removed"][0]["name"], "a");
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::try_from(tmp.path().join("out.json")).unwrap();
        write_file(&serde_json::json!({"ok": true}), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"ok\": true"));
    }
}
