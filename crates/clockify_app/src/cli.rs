//! Command-line parsing. Kept free of IO so it can be tested directly.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clockify_engine::{AccessScope, DEFAULT_CHUNK_SIZE, DEFAULT_EXPORT_DIR};

pub const DEFAULT_ROSTER: &str = "access_roster.ron";
pub const DEFAULT_TEMPLATE: &str = "expense_template.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub command: Command,
    pub export_dir: PathBuf,
    pub export: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Access(AccessArgs),
    UploadExpenses(UploadArgs),
    Template { path: PathBuf },
    Check,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessArgs {
    pub scope: AccessScope,
    pub roster: PathBuf,
    pub apply: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadArgs {
    pub csv: PathBuf,
    pub dry_run: bool,
    pub chunk_size: usize,
    pub user_email: Option<String>,
    pub workspace: Option<String>,
    pub column_mapping: HashMap<String, String>,
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Cli> {
    let mut args = args.into_iter();
    let task = args.next();
    let mut rest = Options::default();
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--export-dir" => rest.export_dir = Some(PathBuf::from(value_of(&arg, args.next())?)),
            "--no-export" => rest.no_export = true,
            "--verbose" | "-v" => rest.verbose = true,
            "--apply" => rest.apply = true,
            "--dry-run" => rest.dry_run = true,
            "--roster" => rest.roster = Some(PathBuf::from(value_of(&arg, args.next())?)),
            "--client-id" => rest.set_scope(AccessScope::ClientId(value_of(&arg, args.next())?))?,
            "--client-name" => {
                rest.set_scope(AccessScope::ClientName(value_of(&arg, args.next())?))?
            }
            "--project-id" => rest.set_scope(AccessScope::ProjectId(value_of(&arg, args.next())?))?,
            "--project-name" => {
                rest.set_scope(AccessScope::ProjectName(value_of(&arg, args.next())?))?
            }
            "--chunk-size" => {
                let raw = value_of(&arg, args.next())?;
                let size: usize = raw
                    .parse()
                    .with_context(|| format!("--chunk-size expects a number, got {raw:?}"))?;
                if size == 0 {
                    bail!("--chunk-size must be at least 1");
                }
                rest.chunk_size = Some(size);
            }
            "--user-email" => rest.user_email = Some(value_of(&arg, args.next())?),
            "--workspace" => rest.workspace = Some(value_of(&arg, args.next())?),
            "--map" => {
                let raw = value_of(&arg, args.next())?;
                let (from, to) = raw
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--map expects FROM=TO, got {raw:?}"))?;
                rest.column_mapping
                    .insert(from.trim().to_string(), to.trim().to_string());
            }
            flag if flag.starts_with("--") => bail!("Unknown option: {flag}"),
            _ => positional.push(arg),
        }
    }

    let command = match task.as_deref() {
        Some("access") => {
            expect_no_positional(&positional)?;
            Command::Access(AccessArgs {
                scope: rest.scope.take().unwrap_or(AccessScope::All),
                roster: rest
                    .roster
                    .take()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_ROSTER)),
                apply: rest.apply,
            })
        }
        Some("upload-expenses") => {
            let [csv] = positional.as_slice() else {
                bail!("upload-expenses expects exactly one CSV path");
            };
            Command::UploadExpenses(UploadArgs {
                csv: PathBuf::from(csv),
                dry_run: rest.dry_run,
                chunk_size: rest.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
                user_email: rest.user_email.take(),
                workspace: rest.workspace.take(),
                column_mapping: std::mem::take(&mut rest.column_mapping),
            })
        }
        Some("template") => {
            if positional.len() > 1 {
                bail!("template takes at most one path");
            }
            Command::Template {
                path: positional
                    .first()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE)),
            }
        }
        Some("check") => {
            expect_no_positional(&positional)?;
            Command::Check
        }
        Some("help") | Some("--help") | Some("-h") | None => Command::Help,
        Some(unknown) => bail!("Unknown command: {unknown}"),
    };

    Ok(Cli {
        command,
        export_dir: rest
            .export_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR)),
        export: !rest.no_export,
        verbose: rest.verbose,
    })
}

pub fn print_help() {
    println!("Clockify workspace operations");
    println!();
    println!("USAGE:");
    println!("    clockify <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    access            Grant roster access to authorized tasks, restrict the rest");
    println!("        --client-id ID | --client-name NAME | --project-id ID | --project-name NAME");
    println!("        --roster PATH     Roster file (default {DEFAULT_ROSTER})");
    println!("        --apply           Update tasks (also enabled by APPROVE_CHANGES=true)");
    println!("    upload-expenses CSV  Validate and create expenses from a CSV file");
    println!("        --dry-run         Validate only");
    println!("        --chunk-size N    Expenses per chunk (default {DEFAULT_CHUNK_SIZE})");
    println!("        --user-email E    User for rows without a user_email column");
    println!("        --workspace ID    Target another workspace");
    println!("        --map FROM=TO     Rename a CSV column before validation");
    println!("    template [PATH]   Write an example CSV (default {DEFAULT_TEMPLATE})");
    println!("    check             Verify credentials and workspace access");
    println!("    help              Show this help message");
    println!();
    println!("OPTIONS:");
    println!("    --export-dir DIR  Snapshot directory (default {DEFAULT_EXPORT_DIR})");
    println!("    --no-export       Do not write snapshot files");
    println!("    --verbose, -v     Mirror the log to the terminal");
}

#[derive(Default)]
struct Options {
    export_dir: Option<PathBuf>,
    no_export: bool,
    verbose: bool,
    apply: bool,
    dry_run: bool,
    roster: Option<PathBuf>,
    scope: Option<AccessScope>,
    chunk_size: Option<usize>,
    user_email: Option<String>,
    workspace: Option<String>,
    column_mapping: HashMap<String, String>,
}

impl Options {
    fn set_scope(&mut self, scope: AccessScope) -> anyhow::Result<()> {
        if self.scope.is_some() {
            bail!("Only one of --client-id, --client-name, --project-id, --project-name may be given");
        }
        self.scope = Some(scope);
        Ok(())
    }
}

fn value_of(flag: &str, value: Option<String>) -> anyhow::Result<String> {
    match value {
        Some(value) if !value.starts_with("--") => Ok(value),
        _ => bail!("{flag} expects a value"),
    }
}

fn expect_no_positional(positional: &[String]) -> anyhow::Result<()> {
    match positional.first() {
        Some(extra) => bail!("Unexpected argument: {extra}"),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> anyhow::Result<Cli> {
        parse_args(line.split_whitespace().map(str::to_string))
    }

    #[test]
    fn access_defaults_to_all_projects_and_dry_run() {
        let cli = parse("access").unwrap();
        assert_eq!(
            cli.command,
            Command::Access(AccessArgs {
                scope: AccessScope::All,
                roster: PathBuf::from(DEFAULT_ROSTER),
                apply: false,
            })
        );
        assert_eq!(cli.export_dir, PathBuf::from(DEFAULT_EXPORT_DIR));
        assert!(cli.export);
    }

    #[test]
    fn access_takes_one_scope() {
        let cli = parse("access --client-name Acme --apply --roster team.ron").unwrap();
        let Command::Access(args) = cli.command else {
            panic!("expected access");
        };
        assert_eq!(args.scope, AccessScope::ClientName("Acme".into()));
        assert!(args.apply);
        assert_eq!(args.roster, PathBuf::from("team.ron"));

        assert!(parse("access --client-id c1 --project-id p1").is_err());
    }

    #[test]
    fn upload_reads_path_and_options() {
        let cli = parse(
            "upload-expenses data.csv --dry-run --chunk-size 10 --map Cost=amount --no-export",
        )
        .unwrap();
        let Command::UploadExpenses(args) = cli.command else {
            panic!("expected upload");
        };
        assert_eq!(args.csv, PathBuf::from("data.csv"));
        assert!(args.dry_run);
        assert_eq!(args.chunk_size, 10);
        assert_eq!(args.column_mapping.get("Cost").map(String::as_str), Some("amount"));
        assert!(!cli.export);
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(parse("upload-expenses").is_err());
        assert!(parse("upload-expenses a.csv --chunk-size 0").is_err());
        assert!(parse("upload-expenses a.csv --chunk-size many").is_err());
        assert!(parse("access --roster").is_err());
        assert!(parse("access --bogus").is_err());
        assert!(parse("deploy").is_err());
    }

    #[test]
    fn template_and_help() {
        assert_eq!(
            parse("template").unwrap().command,
            Command::Template {
                path: PathBuf::from(DEFAULT_TEMPLATE)
            }
        );
        assert_eq!(parse("").unwrap().command, Command::Help);
        assert!(parse("check -v").unwrap().verbose);
    }
}
