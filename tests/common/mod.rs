//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use git2::{BranchType, Oid, Repository, Signature, Time};
use gitbro::generate::Generator;
use gitbro::provider::{
    HttpRequest, HttpResponse, ProviderAdapter, ProviderConfig, ProviderKind, Transport,
    TransportError,
};
use serde_json::json;

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory, with `main`
    /// as the initial branch and a committer identity configured.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).expect("Failed to init git repo");
        {
            let mut config = repo.config().expect("Failed to open repo config");
            config.set_str("user.name", "Test User").expect("Failed to set user.name");
            config
                .set_str("user.email", "test@example.com")
                .expect("Failed to set user.email");
        }
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn signature(&self, author: &str) -> Signature<'_> {
        let email = format!("{}@example.com", author.to_lowercase().replace(' ', "."));
        Signature::now(author, &email).expect("Failed to create signature")
    }

    /// Write a file in the working tree (creating directories).
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Add a file to the index.
    pub fn stage(&self, relative: &str) {
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(relative)).expect("Failed to add file");
        index.write().expect("Failed to write index");
    }

    /// Write and stage a file.
    pub fn write_staged(&self, relative: &str, content: &str) {
        self.write(relative, content);
        self.stage(relative);
    }

    /// Create a commit with the given message. Returns the commit OID.
    pub fn commit(&self, message: &str) -> Oid {
        self.commit_as("Test User", message)
    }

    /// Commit a unique change to `test.txt` with a specific author.
    pub fn commit_as(&self, author: &str, message: &str) -> Oid {
        let content = format!(
            "{}\n{}",
            message,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        self.write_staged("test.txt", &content);
        self.commit_index(author, message)
    }

    /// Commit whatever is in the index.
    pub fn commit_index(&self, author: &str, message: &str) -> Oid {
        let sig = self.signature(author);
        self.commit_with(&sig, message)
    }

    /// Commit a unique change with a fixed commit time, in seconds since the epoch.
    pub fn commit_at(&self, message: &str, seconds: i64) -> Oid {
        self.write_staged("test.txt", message);
        let sig = Signature::new("Test User", "test.user@example.com", &Time::new(seconds, 0))
            .expect("Failed to create signature");
        self.commit_with(&sig, message)
    }

    fn commit_with(&self, sig: &Signature<'_>, message: &str) -> Oid {
        let mut index = self.repo.index().expect("Failed to get index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), sig, sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Create a branch pointing to the given OID.
    pub fn branch(&self, name: &str, oid: Oid) {
        let commit = self.repo.find_commit(oid).expect("Failed to find commit");
        self.repo.branch(name, &commit, false).expect("Failed to create branch");
    }

    /// Switch HEAD to a local branch and update the working tree.
    pub fn checkout(&self, name: &str) {
        let branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .expect("Failed to find branch");
        let object = branch.get().peel(git2::ObjectType::Commit).expect("Failed to peel");
        self.repo
            .checkout_tree(&object, Some(git2::build::CheckoutBuilder::new().force()))
            .expect("Failed to checkout tree");
        self.repo
            .set_head(&format!("refs/heads/{}", name))
            .expect("Failed to set HEAD");
    }

    pub fn branch_names(&self) -> Vec<String> {
        gitbro::git::branches::local_branches(&self.repo).expect("Failed to list branches")
    }

    pub fn head_subject(&self) -> String {
        let commit = self.repo.head().unwrap().peel_to_commit().unwrap();
        commit.summary().unwrap_or("").to_string()
    }
}

/// Shared state behind a [`StubTransport`].
#[derive(Default)]
pub struct StubState {
    replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    calls: AtomicUsize,
    bodies: Mutex<Vec<serde_json::Value>>,
}

/// Transport that replays scripted replies and counts calls. Clones share
/// state, so a test can keep one handle after moving another into a generator.
#[derive(Clone, Default)]
pub struct StubTransport {
    state: Arc<StubState>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a 200 reply in Ollama's wire format.
    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(ollama_reply(text)))
    }

    /// Queue a reply with an error status.
    pub fn status(self, status: u16, body: &str) -> Self {
        self.push(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }))
    }

    /// Queue a connection failure.
    pub fn unreachable(self) -> Self {
        self.push(Err(TransportError::new("connection refused")))
    }

    fn push(self, reply: Result<HttpResponse, TransportError>) -> Self {
        self.state.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// JSON bodies of every request sent, oldest first.
    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.state.bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.bodies.lock().unwrap().push(request.body);
        self.state
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("no scripted reply left")))
    }
}

pub fn ollama_reply(text: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: json!({ "response": text }).to_string(),
    }
}

/// Generator over a stub transport, talking "Ollama".
pub fn stub_generator(stub: &StubTransport) -> Generator<StubTransport> {
    generator_for(stub, ProviderConfig::new(ProviderKind::Ollama))
}

pub fn generator_for(stub: &StubTransport, config: ProviderConfig) -> Generator<StubTransport> {
    Generator::new(ProviderAdapter::with_transport(stub.clone()), config)
}
