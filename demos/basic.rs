//! Basic usage example of the recurrent encoder
//!
//! Encodes a ragged batch of token ids with each supported cell kind and
//! prints the resulting shapes.

use burn::backend::NdArray;
use rnn_encoder::prelude::*;

fn main() -> rnn_encoder::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rnn_encoder=debug".parse().unwrap()),
        )
        .init();

    println!("=== Recurrent Encoder Basic Example ===\n");

    // Use the NdArray backend (CPU)
    type Backend = NdArray<f32>;
    let device = Default::default();

    // Sequences of different lengths; the first is longer than max_len.
    let batch = vec![
        vec![4, 8, 15, 16, 23, 42, 7, 9],
        vec![3, 1, 4],
        vec![2, 7, 1, 8, 2],
    ];

    for kind in [CellKind::Gru, CellKind::Lstm, CellKind::Rnn] {
        println!("Cell: {}", kind);
        let encoder = EncoderRnnConfig::new(64, 6, 32)
            .with_n_layers(2)
            .with_rnn_cell(kind)
            .init::<Backend>(&device)?;

        let encoded = encoder.forward(&batch)?;

        println!("  Lengths:      {:?}", encoded.lengths);
        println!("  Output shape: {:?}", encoded.output.dims());
        println!("  Hidden shape: {:?}", encoded.state.hidden.dims());
        if let Some(cell) = &encoded.state.cell {
            println!("  Cell shape:   {:?}", cell.dims());
        }
        println!();
    }

    println!("Basic example completed!");
    Ok(())
}
