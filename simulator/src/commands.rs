use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use engine::presentation::IncomingCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
  Command(IncomingCommand),
  Quit,
}

pub fn parse_input(line: &str) -> Option<Input> {
  match line.trim().to_ascii_lowercase().as_str() {
    "start" => Some(Input::Command(IncomingCommand::Start)),
    "stop" => Some(Input::Command(IncomingCommand::Stop)),
    "quit" | "exit" => Some(Input::Quit),
    _ => None,
  }
}

/// Forwards `start` and `stop` lines from `reader` to the controller. Returns
/// on `quit`, at end of input, or once the controller stops listening.
pub async fn read_commands<R>(
  reader: R,
  command_tx: async_channel::Sender<IncomingCommand>,
) where
  R: AsyncBufRead + Unpin,
{
  let mut lines = reader.lines();
  loop {
    let line = match lines.next_line().await {
      Ok(Some(line)) => line,
      Ok(None) => break,
      Err(e) => {
        tracing::error!("Unable to read command: {e}");
        break;
      }
    };
    if line.trim().is_empty() {
      continue;
    }

    match parse_input(&line) {
      Some(Input::Command(command)) => {
        if command_tx.send(command).await.is_err() {
          break;
        }
      }
      Some(Input::Quit) => break,
      None => println!("Unknown command '{line}', try start, stop or quit."),
    }
  }

  tracing::debug!("Stopped reading commands");
}
