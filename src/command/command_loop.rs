use std::io;
use log::{debug, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::command::parse::{parse_rocking, parse_selection, parse_support_level, Selection};
use crate::device::session::CommandSender;
use crate::device::types::CommandIntent;
use crate::error::{CommandError, InputError};

const PROMPT_MODE: &str = "Mode (1: rocking, 2: support level): ";
const PROMPT_ROCKING: &str = "Rocking intensity (0: OFF, 1: HIGH, 2: MED, 3: LOW): ";
const PROMPT_SUPPORT_LEVEL: &str = "Support level (1: ECO, 2: TOUR, 3: BOOST): ";
const INVALID_INPUT: &str = "Invalid input. Please enter a valid value.\n";

async fn prompt<R, W>(lines: &mut Lines<R>, output: &mut W, text: &str) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    lines.next_line().await
}

/// Asks for one command. `None` means the input has ended.
async fn read_intent<R, W>(lines: &mut Lines<R>, output: &mut W) -> io::Result<Option<Result<CommandIntent, InputError>>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let selection = match prompt(lines, output, PROMPT_MODE).await? {
        Some(line) => parse_selection(&line),
        None => return Ok(None),
    };

    let selection = match selection {
        Ok(selection) => selection,
        Err(err) => return Ok(Some(Err(err))),
    };

    let text = match selection {
        Selection::Rocking => PROMPT_ROCKING,
        Selection::SupportLevel => PROMPT_SUPPORT_LEVEL,
    };

    Ok(prompt(lines, output, text).await?.map(|line| match selection {
        Selection::Rocking => parse_rocking(&line),
        Selection::SupportLevel => parse_support_level(&line),
    }))
}

/// Reads commands from `input` and submits them until the input ends or the session is gone.
/// Dropping `commands` on return closes the command queue, which shuts the session down.
/// Invalid input is reported on `output` and the user is asked again.
pub async fn command_loop<R, W>(input: R, mut output: W, commands: CommandSender) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        let intent = match read_intent(&mut lines, &mut output).await? {
            None => {
                info!("End of input");
                return Ok(());
            },
            Some(Err(err)) => {
                debug!("Invalid input: {}", err);
                output.write_all(INVALID_INPUT.as_bytes()).await?;
                continue;
            },
            Some(Ok(intent)) => intent,
        };

        match commands.submit(intent).await {
            Ok(()) => output.write_all(b"Sent\n---\n").await?,
            Err(CommandError::SessionClosed) => {
                output.write_all(b"The device session has ended\n").await?;
                output.flush().await?;
                return Ok(());
            },
            Err(err) => output.write_all(format!("Failed: {}\n---\n", err).as_bytes()).await?,
        }
    }
}
