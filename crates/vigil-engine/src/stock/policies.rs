use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use vigil_core::error::{Result, VigilError};
use vigil_core::Ballot;

use super::rules;
use crate::module::ClientData;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubCommandRules {
    command: String,
    subcommands: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandRules {
    commands: Vec<String>,
}

/// Approve `command` when its sub-command is listed; abstain otherwise.
pub fn allow_subcommands(ballot: &mut Ballot, client_data: Option<&ClientData>) -> Result<()> {
    let rules: SubCommandRules = rules(client_data, "allow_subcommands")?;
    if ballot.operation().name != rules.command {
        return Ok(());
    }
    let Some(sub) = ballot.operation().sub_command().map(str::to_string) else {
        return Ok(());
    };
    if rules.subcommands.iter().any(|s| *s == sub) {
        ballot.approve(format!("{} {sub} is allowed", rules.command));
    }
    Ok(())
}

/// Deny `command` when its sub-command is listed.
pub fn deny_subcommands(ballot: &mut Ballot, client_data: Option<&ClientData>) -> Result<()> {
    let rules: SubCommandRules = rules(client_data, "deny_subcommands")?;
    if ballot.operation().name != rules.command {
        return Ok(());
    }
    let Some(sub) = ballot.operation().sub_command().map(str::to_string) else {
        return Ok(());
    };
    if rules.subcommands.iter().any(|s| *s == sub) {
        ballot.deny(format!("{} {sub} is not permitted", rules.command));
    }
    Ok(())
}

/// Deny any listed command outright.
pub fn deny_commands(ballot: &mut Ballot, client_data: Option<&ClientData>) -> Result<()> {
    let rules: CommandRules = rules(client_data, "deny_commands")?;
    let name = ballot.operation().name.clone();
    if rules.commands.iter().any(|c| *c == name) {
        ballot.deny(format!("command {name} is not permitted"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectoryRules {
    command: String,
    directories: Vec<PathBuf>,
    /// Index of the file-name argument.
    #[serde(default)]
    argument: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UriRules {
    command: String,
    uris: Vec<String>,
    /// Index of the URI argument.
    #[serde(default)]
    argument: usize,
}

/// The argument a path or URI rule inspects, if the operation is `command`.
fn target<'b>(ballot: &'b Ballot, command: &str, argument: usize) -> Option<&'b str> {
    if ballot.operation().name != command {
        return None;
    }
    ballot.args().get(argument).map(String::as_str)
}

/// Directory a file name lives in; `None` for a bare name.
fn directory_of(file_name: &str) -> Option<&Path> {
    Path::new(file_name)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

fn listed_directory(rules: &DirectoryRules, file_name: &str) -> Option<bool> {
    let dir = directory_of(file_name)?;
    Some(rules.directories.iter().any(|d| d.as_path() == dir))
}

/// Approve `command` when its file argument lives directly in a listed
/// directory.
pub fn allow_directories(ballot: &mut Ballot, client_data: Option<&ClientData>) -> Result<()> {
    let rules: DirectoryRules = rules(client_data, "allow_directories")?;
    let Some(file_name) = target(ballot, &rules.command, rules.argument) else {
        return Ok(());
    };
    if listed_directory(&rules, file_name) == Some(true) {
        let reason = format!("{file_name} is in a trusted directory");
        ballot.approve(reason);
    }
    Ok(())
}

/// Deny `command` when its file argument lives directly in a listed
/// directory.
pub fn deny_directories(ballot: &mut Ballot, client_data: Option<&ClientData>) -> Result<()> {
    let rules: DirectoryRules = rules(client_data, "deny_directories")?;
    let Some(file_name) = target(ballot, &rules.command, rules.argument) else {
        return Ok(());
    };
    if listed_directory(&rules, file_name) == Some(true) {
        let reason = format!("{} {file_name} is in a denied directory", rules.command);
        ballot.deny(reason);
    }
    Ok(())
}

/// Scheme, host and effective port; the parts a URI rule compares.
fn origin(uri: &Url) -> (&str, Option<&str>, Option<u16>) {
    (uri.scheme(), uri.host_str(), uri.port_or_known_default())
}

/// `Some(listed)` when the argument parses as a URI, `None` otherwise.
fn listed_uri(rules: &UriRules, method: &str, candidate: &str) -> Result<Option<bool>> {
    let listed = rules
        .uris
        .iter()
        .map(|u| {
            Url::parse(u)
                .map_err(|e| VigilError::BadRequest(format!("{method}: invalid uri {u}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;
    let Ok(candidate) = Url::parse(candidate) else {
        return Ok(None);
    };
    Ok(Some(listed.iter().any(|u| origin(u) == origin(&candidate))))
}

/// Approve `command` when its URI argument has a listed scheme and server.
pub fn allow_uris(ballot: &mut Ballot, client_data: Option<&ClientData>) -> Result<()> {
    let rules: UriRules = rules(client_data, "allow_uris")?;
    let Some(uri) = target(ballot, &rules.command, rules.argument).map(str::to_string) else {
        return Ok(());
    };
    if listed_uri(&rules, "allow_uris", &uri)? == Some(true) {
        ballot.approve(format!("{uri} is a trusted location"));
    }
    Ok(())
}

/// Deny `command` when its URI argument has a listed scheme and server.
pub fn deny_uris(ballot: &mut Ballot, client_data: Option<&ClientData>) -> Result<()> {
    let rules: UriRules = rules(client_data, "deny_uris")?;
    let Some(uri) = target(ballot, &rules.command, rules.argument).map(str::to_string) else {
        return Ok(());
    };
    if listed_uri(&rules, "deny_uris", &uri)? == Some(true) {
        ballot.deny(format!("{} {uri} is not permitted", rules.command));
    }
    Ok(())
}
