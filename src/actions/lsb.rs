//! Distribution details via `lsb_release`

use std::sync::LazyLock;

use regex::Regex;

use crate::actions::exec::{self, ExecOptions};
use crate::connections::Connection;
use crate::error::{Error, Result};

static DISTRIBUTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Distributor ID:\s+(.+)").unwrap());
static DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Description:\s+(.+)").unwrap());
static RELEASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Release:\s+(.+)").unwrap());
static CODENAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Codename:\s+(.+)").unwrap());

#[derive(Debug, Clone, Default)]
pub(crate) struct LsbInfo {
    pub distributor_id: String,
    pub description: String,
    pub release: String,
    pub codename: String,
}

/// Query the remote host's distribution details.
pub(crate) fn lsb_info(conn: &dyn Connection, sudo: bool, timeout: u64) -> Result<LsbInfo> {
    let eo = ExecOptions::command("/usr/bin/lsb_release -a", sudo, timeout);
    let rr = exec::run(conn, &eo)?;
    if rr.exit_code != 0 {
        return Err(Error::driver("lsb_release", rr.stderr));
    }

    Ok(parse(&rr.stdout))
}

fn parse(stdout: &str) -> LsbInfo {
    let capture = |re: &Regex| {
        re.captures(stdout)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default()
    };

    LsbInfo {
        distributor_id: capture(&DISTRIBUTOR),
        description: capture(&DESCRIPTION),
        release: capture(&RELEASE),
        codename: capture(&CODENAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "No LSB modules are available.\n\
        Distributor ID:\tUbuntu\n\
        Description:\tUbuntu 22.04.4 LTS\n\
        Release:\t22.04\n\
        Codename:\tjammy\n";

    #[test]
    fn parses_lsb_release_output() {
        let info = parse(OUTPUT);
        assert_eq!(info.distributor_id, "Ubuntu");
        assert_eq!(info.description, "Ubuntu 22.04.4 LTS");
        assert_eq!(info.release, "22.04");
        assert_eq!(info.codename, "jammy");
    }

    #[test]
    fn missing_fields_parse_empty() {
        let info = parse("nothing useful");
        assert!(info.codename.is_empty());
    }
}
