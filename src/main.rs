fn main() {
    println!("lfv-rs - Low-Frequency Variant toolkit");
    println!();
    println!("Tools:");
    println!("  lfv_extract    - Extract low-frequency variants (VCF → TSV)");
    println!("  lfv_consensus  - Build majority or minor consensus genomes (VCF + reference → FASTA)");
    println!("  bb_input       - Write bottleneck-estimator input for a donor/recipient pair");
    println!("  lfv_cohort     - Shared-variant counts for every pair in a directory of VCFs");
    println!();
    println!("For help with each tool:");
    println!("  cargo run --bin lfv_extract -- --help");
    println!("  cargo run --bin lfv_consensus -- --help");
    println!("  cargo run --bin bb_input -- --help");
    println!("  cargo run --bin lfv_cohort -- --help");
    println!();
    println!("Quick start example:");
    println!("  cargo run --bin lfv_extract -- --input-vcf sample.vcf --output sample.lfv.tsv --min-depth 10 --max-freq 0.5");
}
