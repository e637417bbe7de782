//! Speech-to-text backends.
//!
//! A recognizer turns one captured phrase (16 kHz mono f32) into text. Every
//! backend folds its own failures into [`RecognizeError`] so the voice worker
//! can decide what to count, what to log, and what to skip.

use crate::audio::TARGET_RATE;
use crate::config::{split_stt_command, AppConfig, RecognizerKind};
use crate::log_debug;
#[cfg(not(feature = "whisper"))]
use anyhow::bail;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use std::{env, fs, thread};
use thiserror::Error;

/// How often a running speech-to-text command is checked for exit.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Outcomes a recognizer may report instead of text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognizeError {
    #[error("no speech detected")]
    NoSpeech,
    #[error("speech was not intelligible")]
    Unintelligible,
    #[error("recognition service unavailable: {0}")]
    ServiceUnavailable(String),
}

pub trait Recognizer {
    fn recognize(&mut self, samples: &[f32]) -> Result<String, RecognizeError>;

    fn name(&self) -> &'static str;
}

/// Build the recognizer selected on the command line.
pub fn build_recognizer(config: &AppConfig) -> Result<Box<dyn Recognizer + Send>> {
    match config.recognizer {
        RecognizerKind::Command => Ok(Box::new(CommandRecognizer::new(
            &config.stt_cmd,
            &config.lang,
            config.stt_timeout(),
        )?)),
        RecognizerKind::Whisper => {
            #[cfg(feature = "whisper")]
            {
                let model = config
                    .whisper_model_path
                    .as_deref()
                    .ok_or_else(|| anyhow!("--recognizer whisper needs --whisper-model-path"))?;
                Ok(Box::new(WhisperRecognizer::new(model, &config.lang)?))
            }
            #[cfg(not(feature = "whisper"))]
            {
                bail!("--recognizer whisper requires building with the 'whisper' feature")
            }
        }
    }
}

/// Strip non-speech markers (`[noise]`, `(music)`, ...) and collapse whitespace.
pub fn sanitize_transcript(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    static NON_SPEECH_RE: OnceLock<Regex> = OnceLock::new();
    let re = NON_SPEECH_RE.get_or_init(|| {
        Regex::new(
            r"(?i)\[\s*\]|\(\s*\)|\[(?:\s*(?:silence|noise|inaudible|blank_audio|blank audio|music|laughter|applause|cough|breath(?:ing)?|wind|background)\s*)\]|\((?:\s*(?:silence|noise|inaudible|blank audio|music|laughter|applause|cough|breath(?:ing)?|wind|background|wind blowing)\s*)\)",
        )
        .expect("non-speech regex should compile")
    });
    let without_markers = re.replace_all(trimmed, " ");
    without_markers
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs an external speech-to-text program once per phrase.
///
/// The phrase is written to a temporary 16-bit mono WAV whose path is passed
/// as the last argument. The program prints either the transcript as plain
/// text or a JSON line such as `{"transcript": "go left"}`. A JSON reply may
/// also carry `"status": "no_speech" | "unintelligible" | "unavailable"`.
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    lang: String,
    timeout: Duration,
    scratch_dir: PathBuf,
    sequence: u64,
}

impl CommandRecognizer {
    pub fn new(stt_cmd: &str, lang: &str, timeout: Duration) -> Result<Self> {
        let (program, args) = split_stt_command(stt_cmd)?;
        Ok(Self {
            program,
            args,
            lang: lang.to_string(),
            timeout,
            scratch_dir: env::temp_dir(),
            sequence: 0,
        })
    }

    #[cfg(test)]
    fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = dir;
        self
    }

    fn next_wav_path(&mut self) -> PathBuf {
        self.sequence += 1;
        self.scratch_dir.join(format!(
            "voxsnake_phrase_{}_{}.wav",
            std::process::id(),
            self.sequence
        ))
    }

    fn run(&self, wav: &Path) -> Result<String, RecognizeError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(wav)
            .env("VOXSNAKE_LANG", &self.lang)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let started = Instant::now();
        let output = run_with_timeout(cmd, self.timeout)
            .with_context(|| format!("speech-to-text command '{}'", self.program))
            .map_err(|err| RecognizeError::ServiceUnavailable(format!("{err:#}")))?;
        log_debug(&format!(
            "stt_command|status={}|elapsed_ms={}|stdout_bytes={}",
            output.status,
            started.elapsed().as_millis(),
            output.stdout.len()
        ));

        if !output.status.success() {
            return Err(RecognizeError::ServiceUnavailable(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                output.stderr.trim()
            )));
        }
        parse_reply(&output.stdout)
    }
}

impl Recognizer for CommandRecognizer {
    fn recognize(&mut self, samples: &[f32]) -> Result<String, RecognizeError> {
        if samples.is_empty() {
            return Err(RecognizeError::NoSpeech);
        }
        let wav = self.next_wav_path();
        write_wav(&wav, samples)
            .map_err(|err| RecognizeError::ServiceUnavailable(format!("{err:#}")))?;
        let result = self.run(&wav);
        if let Err(err) = fs::remove_file(&wav) {
            log_debug(&format!(
                "failed to remove phrase file {}: {err}",
                wav.display()
            ));
        }
        result
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Write `samples` as a 16-bit PCM mono WAV at the recognizer rate.
pub(crate) fn write_wav(path: &Path, samples: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(scaled)?;
    }
    writer.finalize().context("failed to finalize phrase WAV")?;
    Ok(())
}

struct ChildOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Spawn `cmd` and wait for it, killing it once `timeout` has passed.
///
/// On unix the child leads its own process group, so a shell-wrapped helper
/// is killed together with everything it started.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<ChildOutput> {
    #[cfg(unix)]
    cmd.process_group(0);
    let mut child = cmd.spawn().context("failed to spawn")?;
    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        _ => {
            kill_process_group(&mut child);
            return Err(anyhow!("failed to capture child output"));
        }
    };
    // Drain both pipes off-thread so a chatty child cannot block on a full pipe.
    let stdout_reader = thread::spawn(move || read_all(stdout));
    let stderr_reader = thread::spawn(move || read_all(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                kill_process_group(&mut child);
                return Err(anyhow!("timed out after {} ms", timeout.as_millis()));
            }
            Ok(None) => thread::sleep(CHILD_POLL_INTERVAL),
            Err(err) => {
                kill_process_group(&mut child);
                return Err(anyhow!("wait failed: {err}"));
            }
        }
    };

    let stdout = stdout_reader
        .join()
        .map_err(|_| anyhow!("stdout reader panicked"))?;
    let stderr = stderr_reader
        .join()
        .map_err(|_| anyhow!("stderr reader panicked"))?;
    Ok(ChildOutput {
        status,
        stdout,
        stderr,
    })
}

/// Kill the child and anything it spawned, then reap the child.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
            let _ = child.kill();
            let _ = child.wait();
            return;
        };
        // SAFETY: plain kill(2) on the group this child leads (process_group(0)).
        if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
            log_debug(&format!(
                "failed to signal stt process group {pgid}: {}",
                std::io::Error::last_os_error()
            ));
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn read_all(mut pipe: impl Read) -> String {
    let mut buf = Vec::new();
    if let Err(err) = pipe.read_to_end(&mut buf) {
        log_debug(&format!("failed to read child pipe: {err}"));
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// JSON reply a speech-to-text helper may print instead of plain text.
#[derive(Debug, Deserialize)]
struct TranscriptReply {
    #[serde(default, alias = "text")]
    transcript: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn parse_reply(stdout: &str) -> Result<String, RecognizeError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(RecognizeError::NoSpeech);
    }

    let reply = serde_json::from_str::<TranscriptReply>(trimmed).ok().or_else(|| {
        // Helpers often log before their result; take the last JSON-looking line.
        trimmed.lines().rev().find_map(|line| {
            let line = line.trim();
            if line.starts_with('{') && line.ends_with('}') {
                serde_json::from_str::<TranscriptReply>(line).ok()
            } else {
                None
            }
        })
    });

    let Some(reply) = reply else {
        return Ok(trimmed.to_string());
    };
    match reply.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("no_speech") => Err(RecognizeError::NoSpeech),
        Some("unintelligible") => Err(RecognizeError::Unintelligible),
        Some("unavailable") | Some("error") => Err(RecognizeError::ServiceUnavailable(
            reply
                .error
                .unwrap_or_else(|| "helper reported an error".to_string()),
        )),
        _ if reply.transcript.trim().is_empty() => Err(RecognizeError::NoSpeech),
        _ => Ok(reply.transcript.trim().to_string()),
    }
}

#[cfg(feature = "whisper")]
pub use whisper::WhisperRecognizer;

#[cfg(all(feature = "whisper", unix))]
mod whisper {
    use super::{RecognizeError, Recognizer};
    use crate::log_debug;
    use anyhow::{anyhow, Context, Result};
    use std::io;
    use std::os::raw::{c_char, c_uint, c_void};
    use std::os::unix::io::AsRawFd;
    use std::path::Path;
    use std::sync::Once;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// In-process whisper.cpp model, loaded once and reused for every phrase.
    pub struct WhisperRecognizer {
        ctx: WhisperContext,
        lang: String,
    }

    impl WhisperRecognizer {
        /// Load the model with stderr pointed at `/dev/null`, since whisper.cpp
        /// prints its start-up chatter straight to fd 2.
        pub fn new(model_path: &Path, lang: &str) -> Result<Self> {
            install_whisper_log_silencer();
            let model_path = model_path
                .to_str()
                .ok_or_else(|| anyhow!("whisper model path is not valid UTF-8"))?;

            let null = std::fs::OpenOptions::new()
                .write(true)
                .open("/dev/null")
                .context("failed to open /dev/null")?;

            // SAFETY: fd 2 is duplicated and restored before returning; no other
            // code in this process writes to stderr while the TUI is starting.
            let orig_stderr = unsafe { libc::dup(2) };
            if orig_stderr < 0 {
                return Err(anyhow!(
                    "failed to dup stderr: {}",
                    io::Error::last_os_error()
                ));
            }
            if unsafe { libc::dup2(null.as_raw_fd(), 2) } < 0 {
                unsafe {
                    libc::close(orig_stderr);
                }
                return Err(anyhow!(
                    "failed to redirect stderr: {}",
                    io::Error::last_os_error()
                ));
            }

            let ctx_result =
                WhisperContext::new_with_params(model_path, WhisperContextParameters::default());

            let restore_result = unsafe { libc::dup2(orig_stderr, 2) };
            unsafe {
                libc::close(orig_stderr);
            }
            if restore_result < 0 {
                return Err(anyhow!(
                    "failed to restore stderr: {}",
                    io::Error::last_os_error()
                ));
            }

            let ctx = ctx_result.context("failed to load whisper model")?;
            Ok(Self {
                ctx,
                lang: lang.to_string(),
            })
        }

        fn transcribe(&self, samples: &[f32]) -> Result<String> {
            let mut state = self
                .ctx
                .create_state()
                .context("failed to create whisper state")?;
            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            if self.lang.eq_ignore_ascii_case("auto") {
                params.set_language(None);
                params.set_detect_language(true);
            } else {
                params.set_language(Some(&self.lang));
                params.set_detect_language(false);
            }
            // Single words: keep latency low and leave cores for the game.
            params.set_n_threads(num_cpus::get().min(4) as i32);
            params.set_single_segment(true);
            params.set_print_progress(false);
            params.set_print_timestamps(false);
            params.set_print_special(false);
            params.set_print_realtime(false);
            params.set_translate(false);
            state.full(params, samples)?;

            let num_segments = state
                .full_n_segments()
                .context("failed to read whisper segment count")?;
            let mut transcript = String::new();
            for i in 0..num_segments.max(0) {
                match state.full_get_segment_text_lossy(i) {
                    Ok(text) => transcript.push_str(&text),
                    Err(err) => log_debug(&format!("Failed to read whisper segment {i}: {err}")),
                }
            }
            Ok(transcript.replace("[BLANK_AUDIO]", ""))
        }
    }

    impl Recognizer for WhisperRecognizer {
        fn recognize(&mut self, samples: &[f32]) -> Result<String, RecognizeError> {
            if samples.is_empty() {
                return Err(RecognizeError::NoSpeech);
            }
            let text = self
                .transcribe(samples)
                .map_err(|err| RecognizeError::ServiceUnavailable(format!("{err:#}")))?;
            let text = text.trim();
            if text.is_empty() {
                Err(RecognizeError::NoSpeech)
            } else {
                Ok(text.to_string())
            }
        }

        fn name(&self) -> &'static str {
            "whisper"
        }
    }

    fn install_whisper_log_silencer() {
        static INSTALL_LOG_CALLBACK: Once = Once::new();
        INSTALL_LOG_CALLBACK.call_once(|| unsafe {
            whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
        });
    }

    unsafe extern "C" fn whisper_log_callback(
        _level: c_uint,
        _text: *const c_char,
        _user_data: *mut c_void,
    ) {
        // whisper.cpp would otherwise write over the game board.
    }
}

#[cfg(all(feature = "whisper", not(unix)))]
mod whisper {
    use super::{RecognizeError, Recognizer};
    use anyhow::{anyhow, Result};
    use std::path::Path;

    pub struct WhisperRecognizer;

    impl WhisperRecognizer {
        pub fn new(_: &Path, _: &str) -> Result<Self> {
            Err(anyhow!(
                "Whisper transcription is currently supported only on Unix-like platforms"
            ))
        }
    }

    impl Recognizer for WhisperRecognizer {
        fn recognize(&mut self, _: &[f32]) -> Result<String, RecognizeError> {
            Err(RecognizeError::ServiceUnavailable(
                "whisper is not supported on this platform".to_string(),
            ))
        }

        fn name(&self) -> &'static str {
            "whisper"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn sanitize_strips_non_speech_markers() {
        assert_eq!(sanitize_transcript("  [noise] go   left (music) "), "go left");
        assert_eq!(sanitize_transcript("[BLANK_AUDIO]"), "");
        assert_eq!(sanitize_transcript("   "), "");
    }

    #[test]
    fn sanitize_keeps_regular_words() {
        assert_eq!(sanitize_transcript("Start the game"), "Start the game");
    }

    #[test]
    fn plain_text_reply_is_the_transcript() {
        assert_eq!(parse_reply("  go up\n"), Ok("go up".to_string()));
    }

    #[test]
    fn empty_reply_is_no_speech() {
        assert_eq!(parse_reply(" \n "), Err(RecognizeError::NoSpeech));
    }

    #[test]
    fn json_reply_uses_transcript_field() {
        assert_eq!(
            parse_reply(r#"{"transcript": " turn right "}"#),
            Ok("turn right".to_string())
        );
        assert_eq!(parse_reply(r#"{"text": "down"}"#), Ok("down".to_string()));
    }

    #[test]
    fn json_reply_after_log_lines_is_found() {
        let stdout = "loading model\n{\"transcript\": \"quit\"}\n";
        assert_eq!(parse_reply(stdout), Ok("quit".to_string()));
    }

    #[test]
    fn json_status_maps_to_outcomes() {
        assert_eq!(
            parse_reply(r#"{"status": "no_speech"}"#),
            Err(RecognizeError::NoSpeech)
        );
        assert_eq!(
            parse_reply(r#"{"status": "UNINTELLIGIBLE"}"#),
            Err(RecognizeError::Unintelligible)
        );
        assert_eq!(
            parse_reply(r#"{"status": "unavailable", "error": "offline"}"#),
            Err(RecognizeError::ServiceUnavailable("offline".to_string()))
        );
        assert_eq!(
            parse_reply(r#"{"transcript": ""}"#),
            Err(RecognizeError::NoSpeech)
        );
    }

    #[test]
    fn build_recognizer_defaults_to_command() {
        let config = AppConfig::parse_from(["voxsnake", "--stt-cmd", "my-stt --fast"]);
        let recognizer = build_recognizer(&config).expect("command recognizer");
        assert_eq!(recognizer.name(), "command");
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn build_recognizer_rejects_whisper_without_feature() {
        let config = AppConfig::parse_from(["voxsnake", "--recognizer", "whisper"]);
        assert!(build_recognizer(&config).is_err());
    }

    #[test]
    fn write_wav_produces_16k_mono_pcm() {
        let path = env::temp_dir().join(format!("voxsnake_wav_test_{}.wav", std::process::id()));
        write_wav(&path, &[0.0, 0.5, -0.5, 2.0]).expect("write wav");
        let reader = hound::WavReader::open(&path).expect("open wav");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, TARGET_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<_, _>>()
            .expect("samples");
        assert_eq!(samples, vec![0, 16_383, -16_383, i16::MAX]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn empty_phrase_is_no_speech_without_spawning() {
        let mut recognizer =
            CommandRecognizer::new("definitely-not-installed-stt", "en", Duration::from_secs(1))
                .expect("recognizer");
        assert_eq!(recognizer.recognize(&[]), Err(RecognizeError::NoSpeech));
    }

    #[test]
    fn missing_program_is_service_unavailable() {
        let mut recognizer =
            CommandRecognizer::new("definitely-not-installed-stt", "en", Duration::from_secs(1))
                .expect("recognizer");
        match recognizer.recognize(&[0.1; 160]) {
            Err(RecognizeError::ServiceUnavailable(reason)) => {
                assert!(reason.contains("definitely-not-installed-stt"), "{reason}");
            }
            other => panic!("expected service unavailable, got {other:?}"),
        }
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn scratch_dir(label: &str) -> PathBuf {
            let dir = env::temp_dir().join(format!("voxsnake_{label}_{}", std::process::id()));
            fs::create_dir_all(&dir).expect("scratch dir");
            dir
        }

        fn recognizer(cmd: &str, timeout_ms: u64, label: &str) -> (CommandRecognizer, PathBuf) {
            let dir = scratch_dir(label);
            let recognizer = CommandRecognizer::new(cmd, "en", Duration::from_millis(timeout_ms))
                .expect("recognizer")
                .with_scratch_dir(dir.clone());
            (recognizer, dir)
        }

        #[test]
        fn command_stdout_becomes_transcript() {
            let (mut stt, dir) = recognizer("sh -c 'echo Go Left' stt", 5_000, "stt_ok");
            assert_eq!(stt.recognize(&[0.1; 160]), Ok("Go Left".to_string()));
            let _ = fs::remove_dir_all(dir);
        }

        #[test]
        fn command_receives_wav_path_and_language() {
            let (mut stt, dir) = recognizer(
                r#"sh -c 'test -s "$1" && echo "$VOXSNAKE_LANG"' stt"#,
                5_000,
                "stt_args",
            );
            assert_eq!(stt.recognize(&[0.1; 160]), Ok("en".to_string()));
            let _ = fs::remove_dir_all(dir);
        }

        #[test]
        fn phrase_file_is_removed_after_recognition() {
            let (mut stt, dir) = recognizer("sh -c 'echo up' stt", 5_000, "stt_cleanup");
            stt.recognize(&[0.1; 160]).expect("transcript");
            let leftovers = fs::read_dir(&dir).expect("read dir").count();
            assert_eq!(leftovers, 0);
            let _ = fs::remove_dir_all(dir);
        }

        #[test]
        fn non_zero_exit_is_service_unavailable() {
            let (mut stt, dir) =
                recognizer("sh -c 'echo offline >&2; exit 3' stt", 5_000, "stt_fail");
            match stt.recognize(&[0.1; 160]) {
                Err(RecognizeError::ServiceUnavailable(reason)) => {
                    assert!(reason.contains("offline"), "{reason}");
                }
                other => panic!("expected service unavailable, got {other:?}"),
            }
            let _ = fs::remove_dir_all(dir);
        }

        #[test]
        fn slow_command_is_killed_at_timeout() {
            let (mut stt, dir) = recognizer("sh -c 'sleep 5' stt", 200, "stt_slow");
            let started = Instant::now();
            match stt.recognize(&[0.1; 160]) {
                Err(RecognizeError::ServiceUnavailable(reason)) => {
                    assert!(reason.contains("timed out"), "{reason}");
                }
                other => panic!("expected timeout, got {other:?}"),
            }
            assert!(started.elapsed() < Duration::from_secs(4));
            let _ = fs::remove_dir_all(dir);
        }

        /// Gone, or a zombie waiting for init to reap it.
        #[cfg(target_os = "linux")]
        fn process_exited(pid: i32) -> bool {
            match fs::read_to_string(format!("/proc/{pid}/stat")) {
                Ok(stat) => stat
                    .rsplit_once(')')
                    .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
                Err(_) => true,
            }
        }

        #[cfg(target_os = "linux")]
        #[test]
        fn timeout_also_kills_processes_the_command_started() {
            let dir = scratch_dir("stt_group");
            let pid_file = dir.join("grandchild.pid");
            let cmd = format!(
                "sh -c 'sleep 37 & echo $! > {}; wait' stt",
                pid_file.display()
            );
            let mut stt = CommandRecognizer::new(&cmd, "en", Duration::from_millis(500))
                .expect("recognizer")
                .with_scratch_dir(dir.clone());
            match stt.recognize(&[0.1; 160]) {
                Err(RecognizeError::ServiceUnavailable(reason)) => {
                    assert!(reason.contains("timed out"), "{reason}");
                }
                other => panic!("expected timeout, got {other:?}"),
            }

            let pid: i32 = fs::read_to_string(&pid_file)
                .expect("grandchild pid file")
                .trim()
                .parse()
                .expect("grandchild pid");
            let deadline = Instant::now() + Duration::from_secs(2);
            while !process_exited(pid) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(20));
            }
            assert!(process_exited(pid), "sleep {pid} outlived the timeout");
            let _ = fs::remove_dir_all(dir);
        }
    }
}
