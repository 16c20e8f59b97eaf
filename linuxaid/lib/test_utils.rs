use std::{collections::VecDeque, sync::Mutex};

use linuxaid_utils::{CommandRunner, CommandStatus, ShellCommand, UtilsError, UtilsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A command runner that records invocations and answers with scripted exit codes.
///
/// Once the script runs out every command exits with 0. `None` simulates a spawn failure.
#[derive(Debug, Default)]
pub(crate) struct ScriptedRunner {
    commands: Mutex<Vec<ShellCommand>>,
    exit_codes: Mutex<VecDeque<Option<i32>>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ScriptedRunner {
    pub(crate) fn new(exit_codes: impl IntoIterator<Item = Option<i32>>) -> Self {
        Self {
            commands: Mutex::default(),
            exit_codes: Mutex::new(exit_codes.into_iter().collect()),
        }
    }

    pub(crate) fn commands(&self) -> Vec<ShellCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn command_lines(&self) -> Vec<String> {
        self.commands().iter().map(ToString::to_string).collect()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait::async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &ShellCommand) -> UtilsResult<CommandStatus> {
        self.commands.lock().unwrap().push(command.clone());
        match self.exit_codes.lock().unwrap().pop_front() {
            Some(Some(code)) => Ok(CommandStatus::from_code(code)),
            Some(None) => Err(UtilsError::Spawn {
                command: command.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            None => Ok(CommandStatus::from_code(0)),
        }
    }
}
