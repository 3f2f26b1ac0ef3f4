use std::{
    fs,
    path::{Path, PathBuf},
};

use interlacer::{ConfigError, TrainArgs, TrainError, prepare};
use machine_learning::training::load_checkpoint;

const SIDE: usize = 8;

fn idx_images(n: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    for word in [0x0803u32, n as u32, SIDE as u32, SIDE as u32] {
        bytes.extend(word.to_be_bytes());
    }

    bytes.extend((0..n * SIDE * SIDE).map(|i| ((i * 37) % 256) as u8));
    bytes
}

struct Fixture {
    root: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let mnist = root.path().join("data/mnist");
        fs::create_dir_all(&mnist).unwrap();
        fs::write(mnist.join("train-images-idx3-ubyte"), idx_images(10)).unwrap();
        fs::write(mnist.join("t10k-images-idx3-ubyte"), idx_images(4)).unwrap();

        Self { root }
    }

    fn config(&self, extra: &str, loss_type: &str) -> PathBuf {
        let text = format!(
            "# smoke test\n\
             [DATA]\n\
             dataset = MNIST\n\
             task = undersample\n\
             input_domain = FREQ\n\
             output_domain = FREQ\n\
             corruption_frac = 0.25\n\
             batch_size = 2\n\
             \n\
             [MODEL]\n\
             architecture = CONV\n\
             nonlinearity = relu\n\
             kernel_size = 3\n\
             num_features = 4\n\
             num_layers = 2\n\
             \n\
             [TRAINING]\n\
             loss_type = {loss_type}\n\
             loss = L1\n\
             num_epochs = 3\n\
             seed = 5\n\
             {extra}\n"
        );

        let path = self.root.path().join("exp.ini");
        fs::write(&path, text).unwrap();
        path
    }

    fn train_dir(&self) -> PathBuf {
        self.root.path().join("training")
    }

    fn args(&self, config: PathBuf, debug: bool) -> TrainArgs {
        TrainArgs {
            config,
            experiment: Some("loss_comparison_runs".to_string()),
            suffix: None,
            debug,
            train_dir: self.train_dir(),
            data_dir: self.root.path().join("data"),
        }
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn debug_run_is_a_short_smoke_test_that_cleans_up() {
    let fixture = Fixture::new();
    let args = fixture.args(fixture.config("", "image"), true);

    let (launch, guard) = prepare(&args).unwrap();

    assert_eq!(launch.input_shape(), [SIDE, SIDE, 2]);
    let options = launch.options();
    assert_eq!(options.epochs.get(), 5);
    assert_eq!(options.steps_per_epoch.get(), 2);
    assert_eq!(options.validation_steps, 1);

    let context = launch.context().clone();
    assert!(context.job_name.starts_with("debug_job"));
    assert_eq!(context.checkpoint_dir.parent(), Some(fixture.train_dir().as_path()));

    let history = launch.fit().unwrap();

    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|logs| logs.steps == 2 && logs.validation_steps == 1));
    assert!(history.iter().all(|logs| logs.loss.is_finite()));
    assert_eq!(history[4].metrics.len(), 4);

    let config_copy = format!("{}_config.ini", context.job_name);
    assert_eq!(
        file_names(&context.checkpoint_dir),
        ["cp-0005.ckpt", config_copy.as_str(), "summary.txt", "tensorboard"]
    );

    let params = load_checkpoint(&context.checkpoint_dir.join("cp-0005.ckpt")).unwrap();
    assert_eq!(params.len(), (9 * 2 * 4 + 4) + (9 * 4 * 2 + 2));

    let events = fs::read_to_string(context.tensorboard_dir.join("events.jsonl")).unwrap();
    assert_eq!(events.lines().count(), 5);

    let summary = fs::read_to_string(&context.summary_path).unwrap();
    assert!(summary.contains("Total params: 150"));

    drop(guard);
    assert!(!context.checkpoint_dir.exists());
}

#[test]
fn stopped_debug_run_still_cleans_up() {
    let fixture = Fixture::new();
    let args = fixture.args(fixture.config("", "image"), true);

    let (launch, guard) = prepare(&args).unwrap();
    let checkpoint_dir = launch.context().checkpoint_dir.clone();

    launch.stop_handle().stop();
    let history = launch.fit().unwrap();

    assert!(history.is_empty());
    assert!(!checkpoint_dir.join("cp-0005.ckpt").exists());

    drop(guard);
    assert!(!checkpoint_dir.exists());
}

#[test]
fn real_run_keeps_its_artifacts_and_is_never_reused() {
    let fixture = Fixture::new();
    let mut args = fixture.args(fixture.config("job_name = run1", "freq"), false);
    args.suffix = Some("trial1".to_string());

    let (launch, guard) = prepare(&args).unwrap();

    let context = launch.context();
    assert_eq!(context.job_name, "run1*trial1");
    assert_eq!(
        context.checkpoint_dir,
        fixture.train_dir().join("loss_comparison_runs/run1*trial1")
    );
    assert_eq!(launch.trainer().loss_name(), "fourier_l1");

    let options = launch.options();
    assert_eq!(options.epochs.get(), 3);
    assert_eq!(options.steps_per_epoch.get(), 5);
    assert_eq!(options.validation_steps, 8);

    assert!(matches!(prepare(&args), Err(TrainError::RunExists(_))));

    drop(guard);
    assert!(launch.context().checkpoint_dir.is_dir());
}

#[test]
fn config_errors_leave_no_trace() {
    let fixture = Fixture::new();
    let args = fixture.args(fixture.config("", "other"), true);

    assert!(matches!(
        prepare(&args),
        Err(TrainError::Config(ConfigError::UnrecognizedLossType(name))) if name == "other"
    ));
    assert!(!fixture.train_dir().exists());
}

#[test]
fn missing_dataset_is_a_load_error() {
    let fixture = Fixture::new();
    let mut args = fixture.args(fixture.config("", "image"), false);
    args.data_dir = fixture.root.path().join("elsewhere");

    assert!(matches!(prepare(&args), Err(TrainError::DataLoad(_))));
    assert!(!fixture.train_dir().exists());
}

#[test]
fn missing_config_is_a_usage_error() {
    let fixture = Fixture::new();
    let args = fixture.args(fixture.root.path().join("nope.ini"), false);

    assert!(matches!(prepare(&args), Err(TrainError::Usage(_))));
}
