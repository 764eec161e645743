use criterion::criterion_main;

pub mod generatorbench;
pub mod querybench;

criterion_main!(querybench::query_benches, generatorbench::generator_benches);
