// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use std::fs;
use std::path::Path;

/// Read a yaml file, substituting `$VAR` and `${VAR}` references from the environment
pub fn load_yaml_with_env(file_path: &Path) -> Result<String> {
    let content = fs::read_to_string(file_path)?;
    Ok(shellexpand::env(&content)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_yaml_env_substitution() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("ctoken.config.yaml");
        let mut file = File::create(&file_path)?;
        writeln!(
            file,
            "relayer:\n  url: $CTOKEN_TEST_RELAYER_URL\nchains:\n  - rpc_url: ${{CTOKEN_TEST_RPC}}"
        )?;

        env::set_var("CTOKEN_TEST_RELAYER_URL", "https://relayer.testnet.example");
        env::set_var("CTOKEN_TEST_RPC", "http://localhost:8545");

        let processed = load_yaml_with_env(&file_path)?;

        assert!(processed.contains("https://relayer.testnet.example"));
        assert!(processed.contains("http://localhost:8545"));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_yaml_with_env(Path::new("/nope/ctoken.config.yaml")).unwrap_err();
        let io = err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }
}
