// RSA benchmarks for unsealing and proof generation.
//
// Uses the committed test keys so runs are comparable across machines
// without paying for key generation.

use criterion::{criterion_group, criterion_main, Criterion};

use keyward_protocol::crypto::{PrivateKey, PublicKey};
use keyward_protocol::proof::{self, CommitId, Proof};
use keyward_protocol::secret::Secret;
use keyward_protocol::unseal::{seal_secret, unseal};

const COMMIT: &str = "4f2a9c1d8e7b6a5f4e3d2c1b0a9f8e7d6c5b4a39";

fn keys() -> (PrivateKey, PublicKey) {
    let prover = PrivateKey::from_pem(include_str!("../tests/fixtures/prover_private.pem"))
        .expect("prover key");
    let recipient = PublicKey::from_pem(include_str!("../tests/fixtures/recipient_public.pem"))
        .expect("recipient key");
    (prover, recipient)
}

fn bench_unseal(c: &mut Criterion) {
    let (prover, _) = keys();
    let sealed = seal_secret(&Secret::random(), &prover.public_key())
        .expect("seal")
        .to_base64();

    c.bench_function("rsa/unseal", |b| {
        b.iter(|| unseal(&sealed, &prover).expect("unseal"));
    });
}

fn bench_attest(c: &mut Criterion) {
    let (prover, _) = keys();
    c.bench_function("rsa/pss_attest", |b| {
        b.iter(|| proof::attest(COMMIT, &prover).expect("attest"));
    });
}

fn bench_full_proof(c: &mut Criterion) {
    let (prover, recipient) = keys();
    let commit = CommitId::parse(COMMIT).expect("commit");
    c.bench_function("rsa/proof_generate", |b| {
        b.iter(|| Proof::generate(commit.clone(), &prover, &recipient).expect("proof"));
    });
}

criterion_group!(benches, bench_unseal, bench_attest, bench_full_proof);
criterion_main!(benches);
