//! keydyn entrypoint: one-shot batch run. Loads every per-user keystroke
//! file, extracts attempt features, trains the classifier on a stratified
//! split, reports held-out metrics, and saves the model artifact.

use keydyn::{
    config::PipelineConfig,
    eval::Evaluation,
    events::EventLoader,
    features::FeatureExtractor,
    labels::LabelEncoder,
    model::{design_matrix, select_rows, TrainedModel},
    split::stratified_split,
    logging::StructuredLogger,
};
use keydyn::features::FEATURE_DIM;
use tracing::info;

fn run(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let events = EventLoader::load_dir(&config.data_dir)?;

    let extraction = FeatureExtractor::new().extract(&events)?;
    info!(
        rows = extraction.features.len(),
        cols = FEATURE_DIM,
        "attempt-level feature shape"
    );
    for (user, count) in extraction.attempts_per_user() {
        info!(user_id = user, attempts = count, "attempts per user");
    }

    let encoder = LabelEncoder::fit(extraction.features.iter().map(|f| f.user_id.as_str()));
    let labels: Vec<u32> = extraction
        .features
        .iter()
        .map(|f| encoder.encode(&f.user_id))
        .collect::<Result<_, _>>()?;
    info!(classes = encoder.num_classes(), "enrolled users");

    let split = stratified_split(&labels, &encoder, config.split)?;
    let x = design_matrix(&extraction.features);
    let x_train = select_rows(&x, &split.train);
    let x_test = select_rows(&x, &split.test);
    let y_train: Vec<u32> = split.train.iter().map(|&i| labels[i]).collect();
    let y_test: Vec<u32> = split.test.iter().map(|&i| labels[i]).collect();
    info!(
        train_rows = x_train.nrows(),
        test_rows = x_test.nrows(),
        "train/test shapes"
    );

    let model = TrainedModel::train(x_train.view(), &y_train, encoder, &config.trainer)?;

    let evaluation = Evaluation::compute(&model, x_test.view(), &y_test)?;
    info!(
        accuracy = %format!("{:.3}", evaluation.accuracy),
        roc_auc = %format!("{:.3}", evaluation.roc_auc),
        "held-out metrics"
    );
    for sample in &evaluation.samples {
        info!(
            true_user = %sample.true_user,
            predicted_user = %sample.predicted_user,
            "sample prediction"
        );
    }

    model.save(&config.model_path)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("KEYDYN_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let mut config = PipelineConfig::load(&config_path);

    // First positional argument overrides the input directory
    if let Some(dir) = std::env::args().nth(1) {
        config.data_dir = dir.into();
    }

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(data_dir = ?config.data_dir, "keydyn pipeline starting");

    run(&config)?;
    info!("keydyn pipeline complete");
    Ok(())
}
