//! Ingest core services
//!
//! Collaborators (blob store, tag reader, enrichment, embedding) are traits
//! with a live implementation and an in-process one for tests and offline use.

pub mod blob_store;
pub mod embedding_client;
pub mod embedding_store;
pub mod enrichment;
pub mod file_scanner;
pub mod genre_resolver;
pub mod hasher;
pub mod ingest_pipeline;
pub mod ingest_queue;
pub mod library_linker;
pub mod musicbrainz_client;
pub mod playlist_export;
pub mod playlist_manager;
pub mod tag_reader;

pub use blob_store::{blob_key, BlobError, BlobReader, BlobStore, FsBlobStore};
pub use embedding_client::{EmbeddingError, EmbeddingProvider, HttpEmbeddingClient, StaticEmbedder};
pub use embedding_store::{cosine_similarity, EmbeddingStore, SimilarityError};
pub use enrichment::{Correction, EnrichmentError, EnrichmentProvider, StaticEnrichment};
pub use file_scanner::{FileScanner, ScanError, SUPPORTED_EXTENSIONS};
pub use genre_resolver::{GenreResolver, TRIGRAM_THRESHOLD};
pub use hasher::hash_file;
pub use ingest_pipeline::{detect_content_type, IngestPipeline};
pub use ingest_queue::IngestQueue;
pub use library_linker::LibraryLinker;
pub use musicbrainz_client::MusicBrainzClient;
pub use playlist_export::PlaylistExporter;
pub use playlist_manager::PlaylistManager;
pub use tag_reader::{LoftyTagReader, TagError, TagReader};
