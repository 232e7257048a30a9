use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

pub const CRLF: &str = "\r\n";

/// Raw FTP verbs as they travel over the control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum RawCommand {
    // Access control
    User,
    Pass,
    Quit,
    Acct,
    Cwd,
    Cdup,
    Smnt,
    Rein,

    // Transfer parameters
    Port,
    Pasv,
    Type,
    Stru,
    Mode,

    // Service commands
    Retr,
    Stor,
    Noop,
    Stou,
    Appe,
    Allo,
    Rest,
    Rnfr,
    Rnto,
    Abor,
    Dele,
    Rmd,
    Mkd,
    Pwd,
    List,
    Nlst,
    Site,
    Syst,
    Stat,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgHint {
    None,
    Required,
    Optional,
}

#[derive(Debug, PartialEq)]
pub struct RawCommandInfo {
    pub id: u8,
    pub name: &'static str,
    pub args: ArgHint,
    /// Part of the minimum implementation every server must provide.
    pub basic: bool,
    pub command: RawCommand,
}

impl RawCommandInfo {
    pub fn verb(&self) -> &'static str {
        self.command.verb()
    }
}

macro_rules! entry {
    ($id:expr, $command:ident, $name:expr, $args:ident, $basic:expr) => {
        RawCommandInfo {
            id: $id,
            name: $name,
            args: ArgHint::$args,
            basic: $basic,
            command: RawCommand::$command,
        }
    };
}

pub static RAW_COMMANDS: &[RawCommandInfo] = &[
    entry!(0x01, User, "user name", Required, true),
    entry!(0x02, Pass, "password", Optional, true),
    entry!(0x03, Quit, "logout", None, true),
    entry!(0x04, Acct, "account", Required, false),
    entry!(0x05, Cwd, "change working directory", Required, false),
    entry!(0x06, Cdup, "change to parent directory", None, false),
    entry!(0x07, Smnt, "structure mount", Required, false),
    entry!(0x08, Rein, "reinitialize", None, false),
    entry!(0x09, Port, "data port", Required, true),
    entry!(0x0A, Pasv, "passive", None, true),
    entry!(0x0B, Type, "representation type", Required, true),
    entry!(0x0C, Stru, "file structure", Required, true),
    entry!(0x0D, Mode, "transfer mode", Required, true),
    entry!(0x0E, Retr, "retrieve", Required, true),
    entry!(0x0F, Stor, "store", Required, true),
    entry!(0x10, Noop, "no operation", None, true),
    entry!(0x11, Stou, "store unique", None, false),
    entry!(0x12, Appe, "append", Required, false),
    entry!(0x13, Allo, "allocate", Required, false),
    entry!(0x14, Rest, "restart", Required, false),
    entry!(0x15, Rnfr, "rename from", Required, false),
    entry!(0x16, Rnto, "rename to", Required, false),
    entry!(0x17, Abor, "abort", None, false),
    entry!(0x18, Dele, "delete", Required, false),
    entry!(0x19, Rmd, "remove directory", Required, false),
    entry!(0x1A, Mkd, "make directory", Required, false),
    entry!(0x1B, Pwd, "print working directory", None, false),
    entry!(0x1C, List, "list", Optional, false),
    entry!(0x1D, Nlst, "name list", Optional, false),
    entry!(0x1E, Site, "site parameters", Required, false),
    entry!(0x1F, Syst, "system", None, false),
    entry!(0x20, Stat, "status", Optional, false),
    entry!(0x21, Help, "help", Optional, false),
];

pub fn lookup(id: u8) -> Option<&'static RawCommandInfo> {
    RAW_COMMANDS.iter().find(|info| info.id == id)
}

pub fn lookup_verb(verb: &str) -> Option<&'static RawCommandInfo> {
    let command: RawCommand = verb.parse().ok()?;
    Some(command.info())
}

impl RawCommand {
    pub fn verb(self) -> &'static str {
        self.into()
    }

    pub fn info(self) -> &'static RawCommandInfo {
        // Every variant has exactly one catalog row, see `test_catalog_is_complete`.
        RAW_COMMANDS
            .iter()
            .find(|info| info.command == self)
            .unwrap_or(&RAW_COMMANDS[0])
    }

    pub fn id(self) -> u8 {
        self.info().id
    }

    /// Builds the CRLF terminated request line, parameters separated by
    /// single spaces.
    pub fn request(self, params: &[&str]) -> String {
        let mut request = self.verb().to_owned();
        for param in params {
            request.push(' ');
            request.push_str(param);
        }
        request.push_str(CRLF);
        request
    }

    pub fn all() -> impl Iterator<Item = RawCommand> {
        RawCommand::iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id() {
        assert_eq!(lookup(0x01).unwrap().verb(), "USER");
        assert_eq!(lookup(0x0A).unwrap().verb(), "PASV");
        assert_eq!(lookup(0x0E).unwrap().verb(), "RETR");
        assert_eq!(lookup(0x1C).unwrap().verb(), "LIST");
        assert_eq!(lookup(0x21).unwrap().verb(), "HELP");
        assert!(lookup(0x00).is_none());
        assert!(lookup(0x22).is_none());
    }

    #[test]
    fn test_catalog_is_complete() {
        for command in RawCommand::all() {
            let rows: Vec<_> = RAW_COMMANDS
                .iter()
                .filter(|info| info.command == command)
                .collect();
            assert_eq!(rows.len(), 1, "{} must appear exactly once", command);
            assert_eq!(lookup(rows[0].id), Some(rows[0]));
        }
        let mut ids: Vec<u8> = RAW_COMMANDS.iter().map(|info| info.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), RAW_COMMANDS.len());
    }

    #[test]
    fn test_verbs() {
        assert_eq!(RawCommand::Syst.to_string(), "SYST");
        assert_eq!(lookup_verb("retr").unwrap().command, RawCommand::Retr);
        assert!(lookup_verb("XYZ").is_none());
        assert_eq!(RawCommand::Retr.request(&["file.txt"]), "RETR file.txt\r\n");
        assert_eq!(RawCommand::Pasv.request(&[]), "PASV\r\n");
        assert_eq!(RawCommand::Type.request(&["L", "8"]), "TYPE L 8\r\n");
    }
}
