//! Interactive debugger shell.

pub mod binfile;

use crate::debugger::platform::TaskId;
use crate::debugger::{Debugger, Error};
use anyhow::{anyhow, bail};
use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::path::PathBuf;

const PROMPT: &str = "(Chronos)> ";

const HELP: &str = "\
quit                 exit the debugger
file <path>          set the debug target
run                  launch the debug target under trace
attach <pid>         attach to a running process
continue             resume the debugee until the next signal
break <address>      set a breakpoint (hex address, 0x prefix optional)
unbreak <address>    remove a breakpoint
breakpoints          list installed breakpoints
help                 print this message";

pub struct Console {
    debugger: Debugger,
    target: Option<PathBuf>,
}

impl Console {
    pub fn new(target: Option<PathBuf>) -> Self {
        Self {
            debugger: Debugger::new(),
            target,
        }
    }

    pub fn run(mut self) -> anyhow::Result<()> {
        let mut editor = Editor::<()>::new()?;

        loop {
            match editor.readline(PROMPT) {
                Ok(input) => {
                    let input = input.trim();
                    if input.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(input);

                    if input == "quit" {
                        break;
                    }
                    if let Err(e) = self.handle_command(input) {
                        let fatal = e
                            .downcast_ref::<Error>()
                            .map_or(false, |debugger_err| debugger_err.is_fatal());
                        if fatal {
                            return Err(e);
                        }
                        error!("{e:#}");
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn handle_command(&mut self, input: &str) -> anyhow::Result<()> {
        let args: Vec<&str> = input.split_whitespace().collect();

        match args[0] {
            "help" => {
                for line in HELP.lines() {
                    info!("{line}");
                }
            }
            "file" => {
                let path = PathBuf::from(single_arg(&args, "file <path>")?);
                binfile::validate_executable(&path)?;
                info!("debug target set to '{}'", path.display());
                self.target = Some(path);
            }
            "run" => {
                let path = self
                    .target
                    .clone()
                    .ok_or_else(|| anyhow!("no debug target set, use `file <path>` first"))?;
                self.debugger.run(&path, &[])?;
                info!("debugee '{}' started", path.display());
            }
            "attach" => {
                let pid = parse_task_id(single_arg(&args, "attach <pid>")?)?;
                self.debugger.attach(pid)?;
                info!(
                    "attached to process {pid}, threads: {threads}",
                    threads = self.debugger.threads().count()
                );
            }
            "continue" => self.handle_continue()?,
            "break" => {
                let addr = parse_address(single_arg(&args, "break <address>")?)?;
                self.debugger.add_breakpoint(addr)?;
                info!("set breakpoint at {addr:#018x}");
            }
            "unbreak" => {
                let addr = parse_address(single_arg(&args, "unbreak <address>")?)?;
                self.debugger.remove_breakpoint(addr)?;
                info!("removed breakpoint from {addr:#018x}");
            }
            "breakpoints" => {
                for brkpt in self.debugger.breakpoints() {
                    info!(
                        "{addr:#018x} (enabled: {enabled})",
                        addr = brkpt.address(),
                        enabled = brkpt.is_enabled()
                    );
                }
            }
            unknown => bail!("unknown command '{unknown}', enter `help` for help"),
        }

        Ok(())
    }

    fn handle_continue(&mut self) -> anyhow::Result<()> {
        let debugee_exited = {
            let Some(signal) = self.debugger.continue_execution()? else {
                return Ok(());
            };
            info!("{signal}");
            signal.exit_code().is_some()
        };

        if debugee_exited {
            self.debugger.detach();
        }
        Ok(())
    }
}

fn single_arg<'a>(args: &[&'a str], usage: &str) -> anyhow::Result<&'a str> {
    if args.len() != 2 {
        bail!("invalid usage, please use: {usage}");
    }
    Ok(args[1])
}

fn parse_address(raw: &str) -> anyhow::Result<usize> {
    let digits = raw.strip_prefix("0x").or(raw.strip_prefix("0X")).unwrap_or(raw);
    usize::from_str_radix(digits, 16)
        .map_err(|_| anyhow!("invalid address '{raw}', expected a hex number"))
}

fn parse_task_id(raw: &str) -> anyhow::Result<TaskId> {
    #[cfg(target_os = "linux")]
    {
        let pid = raw
            .parse::<i32>()
            .map_err(|_| anyhow!("invalid pid '{raw}'"))?;
        Ok(nix::unistd::Pid::from_raw(pid))
    }
    #[cfg(windows)]
    {
        raw.parse::<u32>().map_err(|_| anyhow!("invalid pid '{raw}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x401000").unwrap(), 0x401000);
        assert_eq!(parse_address("0X401AbC").unwrap(), 0x401abc);
        assert_eq!(parse_address("7fff0000").unwrap(), 0x7fff0000);
        assert!(parse_address("not-an-address").is_err());
        assert!(parse_address("").is_err());
    }
}
