use crate::Error;
use crate::config::InversionConfiguration;
use chrono::{DateTime, Local};
use log::info;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Destination of the process logger, switched to `job.log` of the run initialised last
#[derive(Clone, Default)]
struct LogSink {
    file: Arc<Mutex<Option<fs::File>>>,
}

impl LogSink {
    /// Send all further records to `file`, closing the previous one
    fn switch_to(&self, file: fs::File) -> Result<(), Error> {
        let mut current: MutexGuard<'_, Option<fs::File>> = self
            .file
            .lock()
            .map_err(|_| Error::InvalidState {
                expected: "usable log sink".to_string(),
                found: "poisoned log sink".to_string(),
            })?;
        *current = Some(file);
        return Ok(());
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut current = self.file.lock().map_err(|_| io::Error::other("poisoned log sink"))?;
        return match current.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        };
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut current = self.file.lock().map_err(|_| io::Error::other("poisoned log sink"))?;
        return match current.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        };
    }
}

/// `None` when another logger was installed before the first run
static LOG_SINK: OnceLock<Option<LogSink>> = OnceLock::new();

/// Working directory of a single run
///
/// ```text
/// job-YYYYMMDD-HH.MM.SS<suffix>/
///     job.log
///     params.json
///     tmp/
///     iteration<N>/
///     final_inv/
/// ```
#[derive(Clone, Debug)]
pub struct RunContext {
    folder: PathBuf,
    start_time: DateTime<Local>,
}

impl RunContext {
    /// Create the job folder and its `tmp` folder under `results_folder`
    pub fn create(results_folder: &Path, folder_suffix: &str) -> Result<Self, Error> {
        let start_time: DateTime<Local> = Local::now();
        let folder_name: String = format!("job-{}{}", start_time.format("%Y%m%d-%H.%M.%S"), folder_suffix);
        let folder: PathBuf = results_folder.join(folder_name);

        fs::create_dir_all(results_folder)?;
        fs::create_dir(&folder)?;
        fs::create_dir(folder.join("tmp"))?;

        return Ok(RunContext { folder, start_time });
    }

    pub fn folder(&self) -> &Path {
        return &self.folder;
    }

    pub fn start_time(&self) -> DateTime<Local> {
        return self.start_time;
    }

    pub fn tmp_folder(&self) -> PathBuf {
        return self.folder.join("tmp");
    }

    pub fn log_path(&self) -> PathBuf {
        return self.folder.join("job.log");
    }

    /// Route log records to `job.log` as `timestamp:LEVEL: message` lines
    ///
    /// The `env_logger` logger is installed once per process, its level comes from `RUST_LOG` (`info` by default).
    /// Every call points it at this run's `job.log`; records of a later run in the same process never reach an earlier run's log.
    /// When some other logger was installed first it is kept and nothing is written to `job.log`.
    pub fn init_logging(&self) -> Result<(), Error> {
        let log_file: fs::File = fs::OpenOptions::new().create(true).append(true).open(self.log_path())?;

        let log_sink: &Option<LogSink> = LOG_SINK.get_or_init(|| {
            let log_sink: LogSink = LogSink::default();
            let installed: Result<(), log::SetLoggerError> = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(log_sink.clone())))
                .format(|buf, record| writeln!(buf, "{}:{}: {}", Local::now().format("%Y-%m-%d %H:%M:%S,%3f"), record.level(), record.args()))
                .try_init();
            return installed.ok().map(|_| log_sink);
        });
        let Some(log_sink) = log_sink else {
            info!("Logger already installed, not logging to {}", self.log_path().display());
            return Ok(());
        };
        log_sink.switch_to(log_file)?;

        info!("Routine start time: {}", self.start_time);
        info!("Initializing logger successful. Logging to {}", self.log_path().display());
        return Ok(());
    }

    /// Dump the parameters to `params.json`
    pub fn save_parameters(&self, config: &InversionConfiguration) -> Result<PathBuf, Error> {
        let path: PathBuf = self.folder.join("params.json");
        fs::write(&path, serde_json::to_string_pretty(config)?)?;
        return Ok(path);
    }

    /// Create and return `iteration<N>`
    pub fn iteration_folder(&self, iteration: usize) -> Result<PathBuf, Error> {
        let folder: PathBuf = self.folder.join(format!("iteration{}", iteration));
        fs::create_dir(&folder)?;
        return Ok(folder);
    }

    /// Create and return `final_inv`
    pub fn final_folder(&self) -> Result<PathBuf, Error> {
        let folder: PathBuf = self.folder.join("final_inv");
        fs::create_dir(&folder)?;
        return Ok(folder);
    }
}

#[test]
fn test_run_context_layout() {
    use crate::config::test_configuration;

    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let results_folder: PathBuf = temporary_directory.path().join("results");

    let run_context: RunContext = RunContext::create(&results_folder, "-layout").expect("run context");

    let folder_name: String = run_context.folder().file_name().expect("folder name").to_string_lossy().to_string();
    assert!(folder_name.starts_with("job-"));
    assert!(folder_name.ends_with("-layout"));
    // job-YYYYMMDD-HH.MM.SS
    assert_eq!(folder_name.len(), "job-20240101-12.00.00-layout".len());
    assert!(run_context.tmp_folder().is_dir());

    let path: PathBuf = run_context.save_parameters(&test_configuration()).expect("parameters");
    let config_read: InversionConfiguration = InversionConfiguration::from_file(&path).expect("read parameters");
    assert_eq!(config_read, test_configuration());

    assert!(run_context.iteration_folder(1).expect("iteration folder").ends_with("iteration1"));
    assert!(run_context.final_folder().expect("final folder").is_dir());

    // Each iteration owns its folder
    assert!(matches!(run_context.iteration_folder(1), Err(Error::Io(_))));
}

#[test]
fn test_log_sink_switches_run() {
    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");
    let first_path: PathBuf = temporary_directory.path().join("first.log");
    let second_path: PathBuf = temporary_directory.path().join("second.log");

    let log_sink: LogSink = LogSink::default();
    let mut writer: LogSink = log_sink.clone();
    // Nothing to write to yet
    writer.write_all(b"dropped\n").expect("write");

    log_sink.switch_to(fs::File::create(&first_path).expect("first log")).expect("switch");
    writer.write_all(b"first run\n").expect("write");
    log_sink.switch_to(fs::File::create(&second_path).expect("second log")).expect("switch");
    writer.write_all(b"second run\n").expect("write");
    writer.flush().expect("flush");

    assert_eq!(fs::read_to_string(&first_path).expect("first log"), "first run\n");
    assert_eq!(fs::read_to_string(&second_path).expect("second log"), "second run\n");
}

#[test]
fn test_init_logging_per_run() {
    let temporary_directory = tempfile::tempdir().expect("can't create temporary directory");

    let first_run: RunContext = RunContext::create(temporary_directory.path(), "-first").expect("first run");
    first_run.init_logging().expect("first logger");
    // Same second, so a different suffix keeps the folders apart
    let second_run: RunContext = RunContext::create(temporary_directory.path(), "-second").expect("second run");
    second_run.init_logging().expect("second logger");

    assert!(first_run.log_path().is_file());
    assert!(second_run.log_path().is_file());

    // Once the second run owns the logger, nothing reaches the first run's log
    let marker: String = format!("only for {}", second_run.folder().display());
    info!("{}", marker);
    let first_log: String = fs::read_to_string(first_run.log_path()).expect("first log");
    assert!(!first_log.contains(&marker));
}
