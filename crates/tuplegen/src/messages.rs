//! Static message table.
//!
//! Every user-visible diagnostic and progress line has one entry: a stable
//! code and a template with positional `{0}`, `{1}`... arguments. The table
//! is a plain `static` array indexed by [`Msg`], so there is nothing to
//! register or initialise at runtime.

use std::fmt::Display;

/// Message kinds, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Msg {
    ConfigInvalid,
    ProbeFailed,
    DuplicateAttribute,
    UnknownAttribute,
    IncompatibleRetype,
    LoadFailed,
    InvalidName,
    RecordShape,
    ToolchainUnavailable,
    TransactionFailed,
    VersionIndeterminate,
    MigrationFailed,
    IoFailed,
    CreatingSchema,
    UpdatingTo,
    UpdatedTo,
    VersionTableEmpty,
    VersionTableRows,
    VersionTableInvalid,
    FrameworkTooNew,
    VersionAhead,
    BuildSucceeded,
    BuildFailed,
}

struct Entry {
    code: &'static str,
    text: &'static str,
}

static MESSAGES: [Entry; 23] = [
    Entry { code: "TG-0100", text: "Configuration is invalid: {0}" },
    Entry { code: "TG-0200", text: "Could not introspect {0}: {1}" },
    Entry { code: "TG-0201", text: "Attempt to add duplicate attribute {0} of type {1} to {2}." },
    Entry { code: "TG-0202", text: "Attempt to remove non-existent attribute {0}." },
    Entry { code: "TG-0203", text: "Column {0} cannot be converted from {1} to {2}." },
    Entry { code: "TG-0300", text: "Artifact for {0} could not be loaded: {1}" },
    Entry { code: "TG-0301", text: "Name {0} is not valid: {1}" },
    Entry { code: "TG-0302", text: "Values do not fit {0}: {1}" },
    Entry { code: "TG-0303", text: "Build toolchain unavailable: {0}" },
    Entry { code: "TG-0400", text: "Database statement failed: {0}" },
    Entry { code: "TG-0500", text: "Schema version cannot be determined: {0}" },
    Entry { code: "TG-0501", text: "Migration step {0} failed: {1}" },
    Entry { code: "TG-0600", text: "File operation failed: {0}" },
    Entry { code: "TG-1000", text: "Creating schema" },
    Entry { code: "TG-1001", text: "Updating to version {0}" },
    Entry { code: "TG-1002", text: "Updated to version {0}" },
    Entry { code: "TG-1003", text: "Version table {0} is empty. It needs one row." },
    Entry { code: "TG-1004", text: "Version table {0} holds {1} rows. It needs exactly one." },
    Entry { code: "TG-1005", text: "Version table {0} contains an invalid value for {1}." },
    Entry { code: "TG-1006", text: "Version table {0} was written by a newer framework (version {1}, this is {2})." },
    Entry { code: "TG-1007", text: "Database is at version {0} but only {1} migration steps are known." },
    Entry { code: "TG-2000", text: "Built {0} version {1}" },
    Entry { code: "TG-2001", text: "Build of {0} failed:\n{1}" },
];

impl Msg {
    fn entry(self) -> &'static Entry {
        &MESSAGES[self as usize]
    }

    /// Stable code for this message.
    pub fn code(self) -> &'static str {
        self.entry().code
    }

    /// Unformatted template text.
    pub fn text(self) -> &'static str {
        self.entry().text
    }

    /// Substitute positional arguments into the template.
    ///
    /// Placeholders without a matching argument are left as-is.
    pub fn format(self, args: &[&dyn Display]) -> String {
        let mut out = self.text().to_string();
        for (i, arg) in args.iter().enumerate() {
            out = out.replace(&format!("{{{}}}", i), &arg.to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [Msg; 23] = [
        Msg::ConfigInvalid,
        Msg::ProbeFailed,
        Msg::DuplicateAttribute,
        Msg::UnknownAttribute,
        Msg::IncompatibleRetype,
        Msg::LoadFailed,
        Msg::InvalidName,
        Msg::RecordShape,
        Msg::ToolchainUnavailable,
        Msg::TransactionFailed,
        Msg::VersionIndeterminate,
        Msg::MigrationFailed,
        Msg::IoFailed,
        Msg::CreatingSchema,
        Msg::UpdatingTo,
        Msg::UpdatedTo,
        Msg::VersionTableEmpty,
        Msg::VersionTableRows,
        Msg::VersionTableInvalid,
        Msg::FrameworkTooNew,
        Msg::VersionAhead,
        Msg::BuildSucceeded,
        Msg::BuildFailed,
    ];

    #[test]
    fn test_codes_unique() {
        let codes: HashSet<_> = ALL.iter().map(|m| m.code()).collect();
        assert_eq!(codes.len(), ALL.len());
    }

    #[test]
    fn test_table_order_matches_enum() {
        for (i, msg) in ALL.iter().enumerate() {
            assert_eq!(*msg as usize, i);
        }
        assert_eq!(Msg::UpdatingTo.text(), "Updating to version {0}");
    }

    #[test]
    fn test_format_positional() {
        let s = Msg::DuplicateAttribute.format(&[&"x", &"int", &"T"]);
        assert_eq!(s, "Attempt to add duplicate attribute x of type int to T.");
        assert_eq!(Msg::UpdatedTo.format(&[&3]), "Updated to version 3");
        assert_eq!(Msg::CreatingSchema.format(&[]), "Creating schema");
    }

    #[test]
    fn test_format_missing_argument_kept() {
        assert_eq!(
            Msg::VersionTableRows.format(&[&"version"]),
            "Version table version holds {1} rows. It needs exactly one."
        );
    }
}
