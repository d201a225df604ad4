use std::{
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
};

use crate::{
    foundation::error::{ReelError, ReelResult},
    narration::{NarrationAudio, SpeechSynthesizer},
};

/// Runs an external text-to-speech program that writes an audio file.
///
/// Arguments may contain the placeholders `{text}`, `{lang}` and `{out}`, replaced with the
/// narration text, the language tag and the path of the audio file the program must write.
/// With `stdin_text` set the text is piped to the program's stdin instead.
#[derive(Clone, Debug)]
pub struct CommandSynthesizer {
    /// Program name or path.
    pub program: String,
    /// Argument template.
    pub args: Vec<String>,
    /// Pipe the text to stdin.
    pub stdin_text: bool,
    /// Extension of the written audio file, without the dot.
    pub extension: String,
}

impl CommandSynthesizer {
    /// `espeak-ng -v <lang> -w <out> -- <text>`. The `--` keeps text starting with `-` from
    /// being read as an option.
    pub fn espeak() -> Self {
        Self {
            program: "espeak-ng".to_string(),
            args: ["-v", "{lang}", "-w", "{out}", "--", "{text}"]
                .map(String::from)
                .to_vec(),
            stdin_text: false,
            extension: "wav".to_string(),
        }
    }

    /// `piper --model <model> --output_file <out>`, text on stdin. Piper voices are
    /// per-language, so the language tag is not passed.
    pub fn piper(model: impl Into<String>) -> Self {
        Self {
            program: "piper".to_string(),
            args: vec![
                "--model".to_string(),
                model.into(),
                "--output_file".to_string(),
                "{out}".to_string(),
            ],
            stdin_text: true,
            extension: "wav".to_string(),
        }
    }

    fn expand_args(&self, text: &str, language: &str, out: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                a.replace("{lang}", language)
                    .replace("{out}", out)
                    .replace("{text}", text)
            })
            .collect()
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    #[tracing::instrument(skip(self, text), fields(program = %self.program, chars = text.len()))]
    fn synthesize(&self, text: &str, language: &str) -> ReelResult<NarrationAudio> {
        if text.trim().is_empty() {
            return Err(ReelError::invalid_input("cannot narrate empty text"));
        }

        let temp = tempfile::Builder::new()
            .prefix("wordreel-narration-")
            .suffix(&format!(".{}", self.extension))
            .tempfile()
            .map_err(|e| ReelError::narration(format!("failed to create narration file: {e}")))?
            .into_temp_path();
        let out = temp.to_string_lossy().into_owned();

        let mut cmd = Command::new(&self.program);
        cmd.args(self.expand_args(text, language, &out))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .stdin(if self.stdin_text {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::narration(format!("failed to spawn '{}': {e}", self.program))
        })?;

        if self.stdin_text
            && let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(text.as_bytes())
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ReelError::narration(format!(
                "failed to write text to '{}': {e}",
                self.program
            )));
        }

        let output = child.wait_with_output().map_err(|e| {
            ReelError::narration(format!("failed to wait for '{}': {e}", self.program))
        })?;
        if !output.status.success() {
            return Err(ReelError::narration(format!(
                "'{}' exited with status {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let audio = NarrationAudio::from_temp(temp)?;
        tracing::info!(secs = audio.duration_secs(), "narration synthesized");
        Ok(audio)
    }
}

/// Narration that was recorded ahead of time. The text is ignored.
#[derive(Clone, Debug)]
pub struct PrerecordedNarration {
    /// Audio file to use as the narration track.
    pub path: PathBuf,
}

impl PrerecordedNarration {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SpeechSynthesizer for PrerecordedNarration {
    fn synthesize(&self, _text: &str, _language: &str) -> ReelResult<NarrationAudio> {
        NarrationAudio::from_file(self.path.clone())
    }
}
