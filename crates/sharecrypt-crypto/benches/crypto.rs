use sharecrypt_crypto::{FileCipher, KeyEnvelope, MasterKey};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt_file(bencher: divan::Bencher, size: usize) {
    let cipher = FileCipher::default();
    let file_key = cipher.generate_key().unwrap();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            cipher
                .encrypt(divan::black_box(&data), divan::black_box(&file_key))
                .unwrap()
        });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt_file(bencher: divan::Bencher, size: usize) {
    let cipher = FileCipher::default();
    let file_key = cipher.generate_key().unwrap();
    let data = make_data(size);
    let encrypted = cipher.encrypt(&data, &file_key).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            cipher
                .decrypt(
                    divan::black_box(&encrypted.ciphertext),
                    divan::black_box(&file_key),
                    &encrypted.nonce,
                    "application/octet-stream",
                )
                .unwrap()
        });
}

#[divan::bench]
fn bench_wrap_unwrap(bencher: divan::Bencher) {
    let envelope = KeyEnvelope::new(MasterKey::from_bytes([0x11; 32]));
    let file_key = FileCipher::default().generate_key().unwrap();
    bencher.bench(|| {
        let wrapped = envelope.wrap_key(divan::black_box(&file_key)).unwrap();
        envelope.unwrap_key(&wrapped).unwrap()
    });
}

fn main() {
    divan::main();
}
