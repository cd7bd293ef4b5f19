//! Vocabulary to encoder example
//!
//! Builds a vocabulary from raw sentences, persists it and the encoder
//! config, then encodes the sentences as one batch.

use burn::backend::NdArray;
use burn::config::Config;
use rnn_encoder::prelude::*;

fn main() -> rnn_encoder::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rnn_encoder=debug".parse().unwrap()),
        )
        .init();

    type Backend = NdArray<f32>;
    let device = Default::default();

    let sentences = [
        "the quick brown fox",
        "jumps over",
        "the lazy dog sleeps all day long",
    ];

    let vocab = Vocabulary::from_tokens(sentences.iter().flat_map(|s| s.split_whitespace()));
    println!("Vocabulary size: {}", vocab.vocab_size());

    let batch: Vec<Vec<usize>> = sentences
        .iter()
        .map(|s| {
            let tokens: Vec<&str> = s.split_whitespace().collect();
            vocab.encode(&tokens)
        })
        .collect();

    let config = EncoderRnnConfig::from_vocab(&vocab, 5, 24)
        .with_cell_name("lstm")?
        .with_input_dropout(0.1)
        .with_dropout(0.2)
        .with_n_layers(2);

    let dir = std::env::temp_dir().join("rnn_encoder_demo");
    std::fs::create_dir_all(&dir)?;
    vocab.save(dir.join("vocab.json"))?;
    config.save(dir.join("encoder.json"))?;
    println!("Saved vocabulary and config to '{}'", dir.display());

    let encoder = config.init::<Backend>(&device)?;
    let encoded = encoder.forward(&batch)?;

    for (i, sentence) in sentences.iter().enumerate() {
        println!(
            "  {:<40} -> {} valid steps",
            format!("\"{}\"", sentence),
            encoded.lengths[i]
        );
    }
    println!("Output shape: {:?}", encoded.output.dims());
    println!("Top-layer state shape: {:?}", encoded.state.last_layer().dims());

    Ok(())
}
