use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn get_input() -> Vec<u8> {
    let mut data = b"Porsche 911 Carrera 4S ".repeat(2048);
    data.extend((0..=255u8).cycle().take(16_384));
    data
}

pub mod refpack {
    use divan::Bencher;
    use nfs_fsh::refpack::{compress, decompress};

    #[divan::bench]
    fn compress_mixed(bencher: Bencher) {
        bencher
            .with_inputs(super::get_input)
            .bench_refs(|data| divan::black_box(compress(data)));
    }

    #[divan::bench]
    fn decompress_mixed(bencher: Bencher) {
        bencher
            .with_inputs(|| compress(&super::get_input()))
            .bench_refs(|data| divan::black_box(decompress(data).unwrap()));
    }
}
