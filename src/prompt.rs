use std::io::{BufRead, Write};

use color_eyre::eyre::{Result, WrapErr, eyre};

use crate::services::audit::source::SelectionProvider;

/// Selection provider talking to the user on stdin/stdout
pub struct ConsolePrompt;

impl SelectionProvider for ConsolePrompt {
    fn show(&mut self, message: &str) {
        println!("{}", message);
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        std::io::stdout()
            .flush()
            .wrap_err("Failed to flush stdout")?;

        let mut answer = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .wrap_err("Failed to read from stdin")?;
        if read == 0 {
            return Err(eyre!("No input available on stdin"));
        }
        Ok(answer.trim_end_matches(['\r', '\n']).to_string())
    }
}
