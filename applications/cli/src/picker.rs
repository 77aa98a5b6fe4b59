/// Interactive volume selection
use async_trait::async_trait;
use flashtune_usb::{UsbError, VolumePicker};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Asks for a mount point on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPicker;

#[async_trait]
impl VolumePicker for StdinPicker {
    async fn pick_volume(&self) -> flashtune_usb::Result<Option<PathBuf>> {
        let line = tokio::task::spawn_blocking(|| -> std::io::Result<String> {
            let mut stdout = std::io::stdout();
            write!(stdout, "Path of the USB volume (empty to cancel): ")?;
            stdout.flush()?;

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| UsbError::TaskPanicked(e.to_string()))?
        .map_err(|e| UsbError::io("read volume path", "stdin", e))?;

        Ok(parse_answer(&line))
    }
}

fn parse_answer(line: &str) -> Option<PathBuf> {
    let trimmed = line.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}
