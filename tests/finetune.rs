use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use t5_pegasus_summarizer::data::{load_tsv, DataGenerator, Sample};
use t5_pegasus_summarizer::generation::{AutoTitle, TitleGenerator};
use t5_pegasus_summarizer::pipeline;
use t5_pegasus_summarizer::t5::{T5Config, T5ForConditionalGeneration};
use t5_pegasus_summarizer::tokenizer::PegasusTokenizer;
use t5_pegasus_summarizer::training::{
    DataFormat, DeviceOption, FinetuneConfig, NoCallback, Trainer,
};
use tch::{nn, Device};

const VOCAB: [&str; 21] = [
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "北", "京", "上", "海", "今", "天", "下", "雨",
    "晴", "了", "是", "气", "温", "高", "，", "。",
];

const TRAIN_DATA: &str = "北京下雨\t北京今天下雨了。\n\
上海晴天\t上海今天是晴天，气温高。\n\
北京晴天\t北京今天是晴天。\n\
上海下雨\t上海今天下雨了，气温不高。\n";

fn tiny_config() -> T5Config {
    T5Config {
        dropout_rate: 0.0,
        d_model: 16,
        d_ff: 32,
        d_kv: 4,
        num_heads: 4,
        num_layers: 1,
        num_decoder_layers: Some(1),
        vocab_size: VOCAB.len() as i64,
        relative_attention_num_buckets: 8,
        ..Default::default()
    }
}

fn write_resources(dir: &Path) -> anyhow::Result<FinetuneConfig> {
    fs::write(dir.join("vocab.txt"), VOCAB.join("\n"))?;
    fs::write(
        dir.join("config.json"),
        serde_json::to_string(&tiny_config())?,
    )?;
    fs::write(dir.join("train.tsv"), TRAIN_DATA)?;
    fs::write(dir.join("dev.tsv"), TRAIN_DATA)?;
    fs::write(dir.join("test.tsv"), TRAIN_DATA)?;

    tch::manual_seed(0);
    let vs = nn::VarStore::new(Device::Cpu);
    let _model = T5ForConditionalGeneration::new(vs.root(), &tiny_config());
    vs.save(dir.join("pretrained.ot"))?;

    Ok(FinetuneConfig {
        config_path: dir.join("config.json"),
        checkpoint_path: dir.join("pretrained.ot"),
        vocab_path: dir.join("vocab.txt"),
        data_format: DataFormat::Tsv,
        train_path: dir.join("train.tsv"),
        valid_path: dir.join("dev.tsv"),
        test_path: dir.join("test.tsv"),
        best_model_path: dir.join("checkpoints").join("best_model.ot"),
        results_path: dir.join("results").join("results.tsv"),
        max_content_len: 32,
        max_title_len: 6,
        batch_size: 2,
        epochs: 2,
        learning_rate: 1e-2,
        beam_size: 2,
        seed: 42,
        lower_case: true,
        device: DeviceOption::Cpu,
    })
}

#[test]
fn training_reduces_loss() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("train.tsv"), TRAIN_DATA)?;
    let data: Vec<Sample> = load_tsv(dir.path().join("train.tsv"))?;
    assert_eq!(data.len(), 4);
    assert_eq!(data[0], Sample::new("北京下雨", "北京今天下雨了。"));

    let tokenizer = PegasusTokenizer::from_tokens(&VOCAB, true)?;
    tch::manual_seed(0);
    let vs = nn::VarStore::new(Device::Cpu);
    let model = T5ForConditionalGeneration::new(vs.root(), &tiny_config());
    let generator = DataGenerator::new(&data, &tokenizer, 2, 32, 6);

    let mut trainer = Trainer::new(&vs, 1e-2, 15, tokenizer.pad_id())?;
    let mut rng = StdRng::seed_from_u64(42);
    let losses = trainer.fit(&model, &generator, &mut rng, &mut NoCallback)?;

    assert_eq!(losses.len(), 15);
    assert!(losses.iter().all(|loss| loss.is_finite()));
    assert!(losses[14] < losses[0]);
    Ok(())
}

#[test]
fn generated_titles_are_bounded() -> anyhow::Result<()> {
    let tokenizer = PegasusTokenizer::from_tokens(&VOCAB, true)?;
    let vs = nn::VarStore::new(Device::Cpu);
    let model = T5ForConditionalGeneration::new(vs.root(), &tiny_config());
    let generator = AutoTitle::new(&model, &tokenizer, 32, 5, Device::Cpu);

    for topk in 1..=3 {
        let title = generator.generate("北京今天下雨了。", topk)?;
        assert!(title.chars().filter(|ch| !ch.is_whitespace()).count() <= 5);
    }
    Ok(())
}

#[test]
fn train_then_evaluate() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_resources(dir.path())?;

    let report = pipeline::train(&config)?;
    assert_eq!(report.epoch_losses.len(), 2);
    assert!((0.0..=1.0).contains(&report.best_bleu));

    let results = fs::read_to_string(&config.results_path)?;
    assert!(results.starts_with("content,title,pred_title\r\n"));
    assert_eq!(results.lines().count(), 1 + 2 * 4);

    let metrics = pipeline::evaluate(&config, Some(config.checkpoint_path.as_path()))?;
    for score in [metrics.rouge_1, metrics.rouge_2, metrics.rouge_l, metrics.bleu] {
        assert!((0.0..=1.0).contains(&score));
    }
    let results = fs::read_to_string(&config.results_path)?;
    assert_eq!(results.lines().count(), 2 + 3 * 4);
    Ok(())
}

#[test]
fn evaluate_reports_missing_weights() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_resources(dir.path())?;
    assert!(pipeline::evaluate(&config, Some(dir.path().join("missing.ot").as_path())).is_err());
    Ok(())
}

#[test]
fn unrelated_weights_are_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = write_resources(dir.path())?;

    let vs = nn::VarStore::new(Device::Cpu);
    let _unrelated = vs.root().zeros("unrelated", &[4, 4]);
    let unrelated_path = dir.path().join("unrelated.ot");
    vs.save(&unrelated_path)?;

    assert!(pipeline::evaluate(&config, Some(unrelated_path.as_path())).is_err());
    config.checkpoint_path = unrelated_path;
    assert!(pipeline::train(&config).is_err());
    Ok(())
}

#[test]
fn pretrained_checkpoint_may_lack_output_head() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_resources(dir.path())?;
    let tokenizer = PegasusTokenizer::from_tokens(&VOCAB, true)?;

    let mut partial = nn::VarStore::new(Device::Cpu);
    let _model = T5ForConditionalGeneration::new(partial.root(), &tiny_config());
    partial.load(&config.checkpoint_path)?;
    let mut variables = partial.variables();
    variables.remove("lm_head.weight");
    let named: Vec<(String, tch::Tensor)> = variables.into_iter().collect();
    let partial_path = dir.path().join("no_head.ot");
    tch::Tensor::save_multi(&named, &partial_path)?;

    assert!(pipeline::load_pretrained_model(&config, &tokenizer, &partial_path).is_ok());
    assert!(pipeline::load_model(&config, &tokenizer, &partial_path).is_err());
    Ok(())
}
