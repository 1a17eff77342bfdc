use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use trawl_core::{FileId, TextRange, TextSize};
use trawl_scheduler::{check_cancelled, CancellationToken, Cancelled, Scheduler, SchedulerConfig};
use trawl_search::{
    InMemoryProject, InMemoryTextProvider, MatchedNode, ParallelReferenceFinder, ParseError,
    PreparedSearch, SearchOutcome, SearchProgress, SearchScope, SearchedFile, SymbolResolver,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
}

pub struct Token {
    node: TextRange,
    ident: TextRange,
    name: String,
}

pub struct FakeTree {
    tokens: Vec<Token>,
}

/// Resolves every identifier to a symbol of the same name. `a.b` chains become member
/// access nodes whose identifier is the last name. Text containing `#error` fails to parse,
/// text containing `#panic` panics.
///
/// Nodes are reported in reverse document order so tests can observe the sorting done by the
/// finder.
#[derive(Default)]
pub struct FakeResolver {
    pub parses: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub delay: Duration,
}

impl FakeResolver {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }
}

impl SymbolResolver for FakeResolver {
    type Tree = FakeTree;
    type Resolution = Symbol;

    fn parse(&self, _file: &FileId, text: &str) -> Result<FakeTree, ParseError> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if text.contains("#error") {
            return Err(ParseError::new("unexpected token"));
        }
        if text.contains("#panic") {
            panic!("resolver bug");
        }
        Ok(FakeTree {
            tokens: tokenize(text),
        })
    }

    fn find_references_in_file(
        &self,
        _scope: &SearchScope<Symbol>,
        tree: &FakeTree,
        _text: &str,
        cancel: &CancellationToken,
        sink: &mut dyn FnMut(MatchedNode, Symbol),
    ) -> Result<(), Cancelled> {
        for token in tree.tokens.iter().rev() {
            check_cancelled(cancel)?;
            let mut node = MatchedNode::new(token.node);
            if token.node != token.ident {
                node = node.with_identifier(token.ident);
            }
            sink(
                node,
                Symbol {
                    name: token.name.clone(),
                },
            );
        }
        Ok(())
    }

    fn resolve_at(&self, tree: &FakeTree, _text: &str, offset: TextSize) -> Option<Symbol> {
        tree.tokens
            .iter()
            .find(|token| token.ident.contains(offset))
            .map(|token| Symbol {
                name: token.name.clone(),
            })
    }
}

fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if bytes[i].is_ascii_alphabetic() || bytes[i] == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let ident = TextRange::new((start as u32).into(), (i as u32).into());
            let node_start = match tokens.last() {
                Some(prev)
                    if start > 0
                        && bytes[start - 1] == b'.'
                        && u32::from(prev.ident.end()) as usize == start - 1 =>
                {
                    prev.node.start()
                }
                _ => ident.start(),
            };
            tokens.push(Token {
                node: TextRange::new(node_start, ident.end()),
                ident,
                name: text[start..i].to_string(),
            });
            continue;
        }
        i += 1;
    }
    tokens
}

pub fn symbol_named(name: &'static str) -> SearchScope<Symbol> {
    SearchScope::new(move |symbol: &Symbol| symbol.name == name)
}

pub struct Fixture {
    pub resolver: Arc<FakeResolver>,
    pub texts: Arc<InMemoryTextProvider>,
    pub project: InMemoryProject,
    pub finder: ParallelReferenceFinder<FakeResolver>,
}

impl Fixture {
    pub fn new(resolver: FakeResolver, threads: usize) -> Self {
        let resolver = Arc::new(resolver);
        let texts = Arc::new(InMemoryTextProvider::new());
        let finder = ParallelReferenceFinder::new(
            resolver.clone(),
            texts.clone(),
            Scheduler::new(SchedulerConfig::with_compute_threads(threads)),
        );
        Self {
            resolver,
            texts,
            project: InMemoryProject::new(),
            finder,
        }
    }

    /// Declare `path` in the project and give it `text`.
    pub fn file(&mut self, path: &str, text: &str) -> FileId {
        let file = FileId::from(path);
        self.project.add_file(file.clone());
        self.texts.insert(file.clone(), text);
        file
    }

    pub fn prepare(&self, scopes: Vec<SearchScope<Symbol>>) -> PreparedSearch<Symbol> {
        self.finder.prepare(&self.project, scopes).unwrap()
    }

    pub fn run(
        &self,
        prepared: &PreparedSearch<Symbol>,
        cancel: &CancellationToken,
    ) -> (SearchOutcome, Vec<SearchedFile<Symbol>>, SearchProgress) {
        let found = Mutex::new(Vec::new());
        let progress = SearchProgress::new();
        let outcome = self.finder.find_references(
            prepared,
            |file| found.lock().push(file),
            &progress,
            cancel,
        );
        let mut found = found.into_inner();
        found.sort_by(|a, b| a.file().cmp(b.file()));
        (outcome, found, progress)
    }
}
