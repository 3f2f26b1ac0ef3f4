use std::num::NonZeroUsize;

use log::info;
use machine_learning::{
    arch::{Model, Sequential},
    optimization::Adam,
    training::{
        Callback, EventLogger, FitOptions, History, ModelCheckpoint, StopHandle, Trainer,
    },
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    cli::TrainArgs,
    config::TrainingConfig,
    data::{self, KspaceGenerator, Split},
    device::DeviceContext,
    error::{ConfigError, Result},
    losses,
    models::{self, ModelSpec},
    run::{self, RunContext, RunGuard},
};

pub const DEBUG_EPOCHS: NonZeroUsize = NonZeroUsize::new(5).unwrap();
pub const DEBUG_STEPS_PER_EPOCH: NonZeroUsize = NonZeroUsize::new(2).unwrap();
pub const DEBUG_VALIDATION_STEPS: usize = 1;
pub const VALIDATION_STEPS: usize = 8;
pub const CHECKPOINT_PERIOD: NonZeroUsize = NonZeroUsize::new(5).unwrap();

/// How long a run trains for.
///
/// Debug runs are a fixed smoke test, real runs go through the training set once per epoch.
///
/// # Errors
/// `ConfigError::InvalidValue` if the batch is larger than the training set.
pub fn fit_options(
    debug: bool,
    num_epochs: NonZeroUsize,
    train_len: usize,
    batch_size: NonZeroUsize,
) -> std::result::Result<FitOptions, ConfigError> {
    if debug {
        return Ok(FitOptions {
            epochs: DEBUG_EPOCHS,
            steps_per_epoch: DEBUG_STEPS_PER_EPOCH,
            validation_steps: DEBUG_VALIDATION_STEPS,
        });
    }

    let steps_per_epoch = NonZeroUsize::new(train_len / batch_size).ok_or_else(|| {
        ConfigError::invalid(
            "batch_size",
            batch_size,
            format!("larger than the {train_len} training images"),
        )
    })?;

    Ok(FitOptions {
        epochs: num_epochs,
        steps_per_epoch,
        validation_steps: VALIDATION_STEPS,
    })
}

/// A compiled model together with everything its fit loop needs.
pub struct Launch {
    trainer: Trainer<Sequential, Adam>,
    train: KspaceGenerator,
    val: KspaceGenerator,
    options: FitOptions,
    callbacks: Vec<Box<dyn Callback + Send>>,
    context: RunContext,
    input_shape: [usize; 3],
}

/// Gets a run ready to train: reads the config, loads the data, builds the model, lays out the
/// run directory and compiles the model.
///
/// Nothing is written to disk until the config, the data and the model are known to be valid.
/// The returned guard owns the cleanup of debug runs and must outlive the fit.
pub fn prepare(args: &TrainArgs) -> Result<(Launch, RunGuard)> {
    args.validate()?;

    let config = TrainingConfig::read(&args.config)?;
    info!("read config {}", args.config.display());

    let images = data::load_images(config.dataset, &args.data_dir)?;
    let options = fit_options(
        args.debug,
        config.num_epochs,
        images.train_len(),
        config.batch_size,
    )?;

    let train = KspaceGenerator::new(images.train.clone(), &config, Split::Train);
    let val = KspaceGenerator::new(images.val.clone(), &config, Split::Val);
    info!(
        "generated {:?} generators corrupting {} line(s) per sample",
        config.task,
        train.corrupted_lines()
    );

    let spec = ModelSpec::from_config(&config, images.side());
    let model = models::build_model(config.architecture, &spec);
    model.output_shape(spec.input_shape)?;
    let summary = model.summary(spec.input_shape)?;
    info!("loaded {} model", config.architecture);

    let job_name = run::job_name(
        &config.job_name,
        args.debug,
        args.suffix.as_deref(),
        &mut rand::rng(),
    );
    let (context, guard) = RunContext::create(
        &args.train_dir,
        args.experiment.as_deref(),
        args.debug,
        &job_name,
        &args.config,
        &summary,
    )?;

    let loss = losses::select_loss(config.loss_type, config.output_domain, config.loss);
    let metrics = losses::monitoring_metrics(config.output_domain);

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let params = model.init_params(&mut rng)?;

    let trainer = Trainer::compile(
        model,
        params,
        Adam::new(config.learning_rate),
        loss,
        metrics,
    )?;
    info!(
        "compiled model with {} loss and learning rate {}",
        trainer.loss_name(),
        config.learning_rate
    );

    if args.debug {
        info!("number of parameters: {}", trainer.count_params());
    }

    let callbacks: Vec<Box<dyn Callback + Send>> = vec![
        Box::new(ModelCheckpoint::new(
            &context.checkpoint_dir,
            CHECKPOINT_PERIOD,
        )),
        Box::new(EventLogger::new(&context.tensorboard_dir)),
    ];

    let launch = Launch {
        trainer,
        train,
        val,
        options,
        callbacks,
        context,
        input_shape: spec.input_shape,
    };

    Ok((launch, guard))
}

impl Launch {
    pub fn options(&self) -> FitOptions {
        self.options
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// The `(n, n, 2)` shape the model takes.
    pub fn input_shape(&self) -> [usize; 3] {
        self.input_shape
    }

    pub fn trainer(&self) -> &Trainer<Sequential, Adam> {
        &self.trainer
    }

    /// A handle that makes the fit return before its next training step.
    pub fn stop_handle(&self) -> StopHandle {
        self.trainer.stop_handle()
    }

    /// Runs the fit loop to completion, any failure aborts the whole run.
    pub fn fit(mut self) -> Result<History> {
        let FitOptions {
            epochs,
            steps_per_epoch,
            validation_steps,
        } = self.options;
        info!(
            "training {} for {epochs} epoch(s) of {steps_per_epoch} step(s), validating on \
             {validation_steps} batch(es)",
            self.context.job_name
        );

        let history = self.trainer.fit(
            &mut self.train,
            &mut self.val,
            self.options,
            &mut self.callbacks,
        )?;

        Ok(history)
    }

    /// Runs `fit` on the threads of `device`.
    pub fn fit_on(self, device: &DeviceContext) -> Result<History> {
        device.install(move || self.fit())
    }
}
