//! Terminal output for tag tables and clustering results.

use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use scholartag_analysis::aggregate::frequencies_to_batch;
use scholartag_analysis::{Dendrogram, IncidenceMatrix, TagCount, render_text};

/// Pretty-print at most `limit` rows of `batch`, noting how many were left out.
pub fn print_batch(batch: &RecordBatch, limit: usize) -> anyhow::Result<()> {
    let shown = batch.slice(0, batch.num_rows().min(limit));
    println!("{}", pretty_format_batches(&[shown])?);
    if batch.num_rows() > limit {
        println!("  ... {} more rows", batch.num_rows() - limit);
    }
    Ok(())
}

pub fn print_frequencies(counts: &[TagCount], limit: usize) -> anyhow::Result<()> {
    println!("\nTag frequencies ({} distinct tags):", counts.len());
    print_batch(&frequencies_to_batch(counts)?, limit)
}

pub fn print_clustering(matrix: &IncidenceMatrix, tree: &Dendrogram, label_width: usize) {
    println!(
        "\nIncidence matrix: {} papers x {} tags",
        matrix.n_papers(),
        matrix.n_tags()
    );
    if tree.merges.is_empty() {
        println!("  Fewer than two tagged papers; nothing to cluster.");
        return;
    }
    println!("\nWard merges:");
    print!("{}", render_text(tree, label_width));
}

#[cfg(feature = "duckdb")]
pub fn print_batches(batches: &[RecordBatch]) -> anyhow::Result<()> {
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    println!("{}", pretty_format_batches(batches)?);
    println!("  {total} rows");
    Ok(())
}
