//! Encrypted-artifact tamper detection across the chunker/encryptor pair.

#[cfg(test)]
mod tests {
    use lucid_sessions::{SessionChunker, SessionEncryptor, SessionError, SessionPipelineConfig};

    use crate::helpers::{scratch_dir, seeded_bytes};

    const MIB: usize = 1024 * 1024;

    #[tokio::test]
    async fn flipped_ciphertext_byte_is_detected() {
        let config = SessionPipelineConfig::under(scratch_dir("chunk-integrity"));
        let encryptor = SessionEncryptor::new(&config, None);
        encryptor.initialize().await.unwrap();

        let plaintext = seeded_bytes(42, MIB);
        let r = encryptor
            .encrypt_chunk(&plaintext, "tamper_chunk_000000", "tamper", None)
            .await
            .unwrap();
        let cached = encryptor.cached_keys();

        // Flip the final byte of the ciphertext region on disk.
        let mut bytes = tokio::fs::read(&r.file_path).await.unwrap();
        *bytes.last_mut().unwrap() ^= 0x01;
        tokio::fs::write(&r.file_path, &bytes).await.unwrap();

        let err = encryptor.decrypt_chunk(&r).await.unwrap_err();
        assert!(matches!(err, SessionError::Integrity(_)));
        assert_eq!(encryptor.cached_keys(), cached);

        encryptor.cleanup_session("tamper").await.unwrap();
    }

    #[tokio::test]
    async fn chunk_and_encrypt_round_trip_preserves_stream() {
        let config = SessionPipelineConfig::under(scratch_dir("chunk-roundtrip"));
        let chunker = SessionChunker::new(&config);
        let encryptor = SessionEncryptor::new(&config, None);
        chunker.initialize().await.unwrap();
        encryptor.initialize().await.unwrap();

        let original = seeded_bytes(7, 9 * MIB);
        let chunks = chunker
            .chunk_buffer("rt-session", &original, Some(8 * MIB))
            .await
            .unwrap();

        let mut recovered = Vec::with_capacity(original.len());
        for chunk in &chunks {
            let plaintext = chunker.read_chunk(chunk).await.unwrap();
            let encrypted = encryptor
                .encrypt_chunk(&plaintext, &chunk.chunk_id, "rt-session", None)
                .await
                .unwrap();
            recovered.extend(encryptor.decrypt_chunk(&encrypted).await.unwrap());
        }
        assert_eq!(recovered, original);

        chunker.cleanup_session("rt-session").await.unwrap();
        encryptor.cleanup_session("rt-session").await.unwrap();
    }

    #[tokio::test]
    async fn artifact_header_is_salt_nonce_tag() {
        let config = SessionPipelineConfig::under(scratch_dir("chunk-header"));
        let encryptor = SessionEncryptor::new(&config, None);
        encryptor.initialize().await.unwrap();

        let r = encryptor
            .encrypt_chunk(b"layout probe", "layout_chunk_000000", "layout", None)
            .await
            .unwrap();
        let bytes = tokio::fs::read(&r.file_path).await.unwrap();

        // First 72 bytes: salt(32) | nonce(24) | tag(16).
        assert_eq!(bytes.len(), 72 + 12);
        assert_eq!(&bytes[32..56], &r.nonce);
        assert_eq!(&bytes[56..72], &r.tag);

        encryptor.cleanup_session("layout").await.unwrap();
    }
}
