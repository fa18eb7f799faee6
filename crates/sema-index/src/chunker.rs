//! AST-based chunking via tree-sitter with full line coverage.
//!
//! Structural chunks come from function/method/class nodes; everything
//! the AST pass leaves uncovered flows into `block` chunks, and files
//! without a grammar are split into `file` chunks, so every non-blank
//! line of a source file lands in exactly one emitted chunk.

use std::collections::HashSet;
use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::error::{IndexError, Result};
use crate::languages::{Lang, NameStrategy, NodeKinds, detect_language, language_label};

/// Marker appended to chunks truncated by the large-node splitter.
const TRUNCATION_MARKER: &str = "\n# ... (truncated)";

/// Rough chars-per-line assumption for the large-node line estimate.
const ASSUMED_CHARS_PER_LINE: usize = 20;

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters (default: 1000).
    pub max_chunk_size: usize,
    /// Minimum chunk size — smaller candidates are discarded (default: 50).
    pub min_chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            min_chunk_size: 50,
        }
    }
}

/// Semantic category of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Function,
    Method,
    Class,
    Block,
    File,
}

impl ChunkKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Block => "block",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chunk of source code with metadata.
#[derive(Debug, Clone)]
pub struct CodeChunk {
    pub content: String,
    pub file_path: String,
    /// 1-based inclusive line range in the original file.
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    pub kind: ChunkKind,
    /// Set when the large-node splitter truncated this chunk.
    pub partial: bool,
    pub function_name: Option<String>,
    pub class_name: Option<String>,
    pub imports: Vec<String>,
    /// Human-readable summary, attached at index time.
    pub context: Option<String>,
    pub content_hash: String,
}

impl CodeChunk {
    /// Payload chunk type string, e.g. `function` or `class_partial`.
    #[must_use]
    pub fn chunk_type(&self) -> String {
        if self.partial {
            format!("{}_partial", self.kind)
        } else {
            self.kind.to_string()
        }
    }
}

/// Shared context for one file's chunking pass.
struct ChunkCtx<'a> {
    source: &'a str,
    lines: &'a [&'a str],
    file_path: &'a str,
    language: &'a str,
    kinds: &'static NodeKinds,
    imports: &'a [String],
    config: &'a ChunkerConfig,
}

/// Chunk a file, choosing the AST path when a grammar exists and the
/// line-based fallback otherwise.
///
/// Never fails: AST errors degrade to line chunking with a warning.
#[must_use]
pub fn chunk_file(file_path: &str, content: &str, config: &ChunkerConfig) -> Vec<CodeChunk> {
    let path = Path::new(file_path);
    match detect_language(path) {
        Some(lang) if lang.grammar().is_some() => {
            match extract_syntax_chunks(file_path, content, lang, config) {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(
                        file = %file_path,
                        error = %e,
                        "AST chunking failed, falling back to line chunking"
                    );
                    chunk_by_lines(file_path, content, lang.id(), config)
                }
            }
        }
        _ => chunk_by_lines(file_path, content, language_label(path), config),
    }
}

/// AST-driven extraction: class, method, and function chunks plus
/// `block` chunks for uncovered lines.
///
/// # Errors
///
/// Returns [`IndexError::UnsupportedLanguage`] when no grammar is
/// enabled for `lang` and [`IndexError::Parse`] on parser failures;
/// callers fall back to [`chunk_by_lines`].
pub fn extract_syntax_chunks(
    file_path: &str,
    content: &str,
    lang: Lang,
    config: &ChunkerConfig,
) -> Result<Vec<CodeChunk>> {
    let grammar = lang.grammar().ok_or(IndexError::UnsupportedLanguage)?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| IndexError::Parse(format!("parse failed for {file_path}")))?;

    let root = tree.root_node();
    let kinds = lang.node_kinds();
    let imports = collect_imports(root, content, kinds);
    let lines: Vec<&str> = content.split('\n').collect();

    let ctx = ChunkCtx {
        source: content,
        lines: &lines,
        file_path,
        language: lang.id(),
        kinds,
        imports: &imports,
        config,
    };

    let class_nodes = find_nodes_by_kind(root, kinds.classes);
    let function_nodes = find_nodes_by_kind(root, kinds.functions);

    let mut chunks = Vec::new();

    for class_node in &class_nodes {
        let Some(class_chunk) = chunk_from_node(&ctx, *class_node, ChunkKind::Class) else {
            continue;
        };
        let class_name = class_chunk.function_name.clone();
        chunks.push(class_chunk);

        for method_node in find_nodes_by_kind(*class_node, kinds.functions) {
            if let Some(mut method_chunk) = chunk_from_node(&ctx, method_node, ChunkKind::Method) {
                method_chunk.class_name = class_name.clone();
                chunks.push(method_chunk);
            }
        }
    }

    for func_node in &function_nodes {
        if !within_any(*func_node, &class_nodes)
            && let Some(chunk) = chunk_from_node(&ctx, *func_node, ChunkKind::Function)
        {
            chunks.push(chunk);
        }
    }

    let covered = covered_lines(&chunks);
    chunks.extend(chunk_uncovered_lines(&ctx, &covered));

    Ok(chunks)
}

/// Line-accumulation fallback for unsupported languages and parse
/// failures. Guarantees total coverage without any AST dependency.
#[must_use]
pub fn chunk_by_lines(
    file_path: &str,
    content: &str,
    language: &str,
    config: &ChunkerConfig,
) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_size = 0usize;
    let mut start_line = 1usize;

    for (idx, line) in lines.iter().enumerate() {
        if !buffer.is_empty() {
            buffer_size += 1;
        }
        buffer_size += line.len();
        buffer.push(line);

        if buffer_size >= config.max_chunk_size {
            push_accumulated(
                &mut chunks,
                &buffer,
                file_path,
                language,
                ChunkKind::File,
                start_line,
                idx + 1,
                &[],
                config,
            );
            buffer.clear();
            buffer_size = 0;
            start_line = idx + 2;
        }
    }

    if !buffer.is_empty() {
        push_accumulated(
            &mut chunks,
            &buffer,
            file_path,
            language,
            ChunkKind::File,
            start_line,
            lines.len(),
            &[],
            config,
        );
    }

    chunks
}

fn find_nodes_by_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut result = Vec::new();
    if !kinds.is_empty() {
        collect_nodes(node, kinds, &mut result);
    }
    result
}

fn collect_nodes<'t>(node: Node<'t>, kinds: &[&str], out: &mut Vec<Node<'t>>) {
    if kinds.contains(&node.kind()) {
        out.push(node);
    }
    let count = u32::try_from(node.child_count()).unwrap_or(u32::MAX);
    for i in 0..count {
        if let Some(child) = node.child(i) {
            collect_nodes(child, kinds, out);
        }
    }
}

fn collect_imports(root: Node<'_>, source: &str, kinds: &NodeKinds) -> Vec<String> {
    find_nodes_by_kind(root, kinds.imports)
        .iter()
        .map(|n| source[n.byte_range()].trim().to_string())
        .collect()
}

/// Containment test: `class.start_byte ≤ fn.start_byte` and
/// `fn.end_byte ≤ class.end_byte` for any class node.
fn within_any(target: Node<'_>, containers: &[Node<'_>]) -> bool {
    containers.iter().any(|c| {
        c.start_byte() <= target.start_byte() && target.end_byte() <= c.end_byte()
    })
}

fn chunk_from_node(ctx: &ChunkCtx<'_>, node: Node<'_>, kind: ChunkKind) -> Option<CodeChunk> {
    let start_line = node.start_position().row + 1;
    let end_line = (node.end_position().row + 1).min(ctx.lines.len());
    let content = ctx.lines[start_line - 1..end_line].join("\n");

    if content.len() < ctx.config.min_chunk_size {
        return None;
    }
    if content.len() > ctx.config.max_chunk_size {
        return Some(split_large_node(ctx, node, kind, start_line));
    }

    Some(CodeChunk {
        content_hash: blake3_hex(&content),
        function_name: extract_name(node, ctx.source, ctx.kinds.name_strategy),
        class_name: None,
        imports: ctx.imports.to_vec(),
        context: None,
        file_path: ctx.file_path.to_string(),
        language: ctx.language.to_string(),
        partial: false,
        content,
        start_line,
        end_line,
        kind,
    })
}

/// Truncate an oversized node to a heuristic line budget.
///
/// The chars-per-line estimate is approximate: very long lines can
/// still push the slice past `max_chunk_size`.
fn split_large_node(
    ctx: &ChunkCtx<'_>,
    node: Node<'_>,
    kind: ChunkKind,
    start_line: usize,
) -> CodeChunk {
    let estimated_lines = (ctx.config.max_chunk_size / ASSUMED_CHARS_PER_LINE).max(10);
    let node_end = (node.end_position().row + 1).min(ctx.lines.len());
    let end_line = node_end.min(start_line + estimated_lines - 1);

    let mut content = ctx.lines[start_line - 1..end_line].join("\n");
    content.push_str(TRUNCATION_MARKER);

    CodeChunk {
        content_hash: blake3_hex(&content),
        function_name: extract_name(node, ctx.source, ctx.kinds.name_strategy),
        class_name: None,
        imports: ctx.imports.to_vec(),
        context: None,
        file_path: ctx.file_path.to_string(),
        language: ctx.language.to_string(),
        partial: true,
        content,
        start_line,
        end_line,
        kind,
    }
}

fn extract_name(node: Node<'_>, source: &str, strategy: NameStrategy) -> Option<String> {
    let count = u32::try_from(node.child_count()).unwrap_or(u32::MAX);

    for i in 0..count {
        let Some(child) = node.child(i) else { continue };
        if child.kind() == "identifier" {
            return Some(source[child.byte_range()].to_string());
        }
    }

    match strategy {
        NameStrategy::Identifier => {
            for i in 0..count {
                let Some(child) = node.child(i) else { continue };
                if matches!(
                    child.kind(),
                    "name" | "type_identifier" | "property_identifier"
                ) {
                    return Some(source[child.byte_range()].to_string());
                }
            }
            None
        }
        NameStrategy::Declarator => {
            for i in 0..count {
                let Some(child) = node.child(i) else { continue };
                if child.kind() == "type_identifier" {
                    return Some(source[child.byte_range()].to_string());
                }
                if child.kind().ends_with("declarator")
                    && let Some(name) = find_identifier_within(child, source)
                {
                    return Some(name);
                }
            }
            None
        }
    }
}

fn find_identifier_within(node: Node<'_>, source: &str) -> Option<String> {
    if matches!(node.kind(), "identifier" | "field_identifier") {
        return Some(source[node.byte_range()].to_string());
    }
    let count = u32::try_from(node.child_count()).unwrap_or(u32::MAX);
    for i in 0..count {
        if let Some(child) = node.child(i)
            && let Some(name) = find_identifier_within(child, source)
        {
            return Some(name);
        }
    }
    None
}

/// Line numbers claimed by any emitted chunk.
fn covered_lines(chunks: &[CodeChunk]) -> HashSet<usize> {
    let mut covered = HashSet::new();
    for chunk in chunks {
        covered.extend(chunk.start_line..=chunk.end_line);
    }
    covered
}

/// Accumulate uncovered non-blank lines into `block` chunks.
///
/// Runs break on covered lines, blank lines, and the max-size bound, so
/// a block chunk is always a contiguous slice of the file.
fn chunk_uncovered_lines(ctx: &ChunkCtx<'_>, covered: &HashSet<usize>) -> Vec<CodeChunk> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_size = 0usize;
    let mut start_line = 0usize;

    for (idx, line) in ctx.lines.iter().enumerate() {
        let line_no = idx + 1;

        if !covered.contains(&line_no) && !line.trim().is_empty() {
            if buffer.is_empty() {
                start_line = line_no;
            } else {
                buffer_size += 1;
            }
            buffer_size += line.len();
            buffer.push(line);

            if buffer_size >= ctx.config.max_chunk_size {
                push_accumulated(
                    &mut chunks,
                    &buffer,
                    ctx.file_path,
                    ctx.language,
                    ChunkKind::Block,
                    start_line,
                    line_no,
                    ctx.imports,
                    ctx.config,
                );
                buffer.clear();
                buffer_size = 0;
            }
        } else if !buffer.is_empty() {
            push_accumulated(
                &mut chunks,
                &buffer,
                ctx.file_path,
                ctx.language,
                ChunkKind::Block,
                start_line,
                line_no - 1,
                ctx.imports,
                ctx.config,
            );
            buffer.clear();
            buffer_size = 0;
        }
    }

    if !buffer.is_empty() {
        push_accumulated(
            &mut chunks,
            &buffer,
            ctx.file_path,
            ctx.language,
            ChunkKind::Block,
            start_line,
            ctx.lines.len(),
            ctx.imports,
            ctx.config,
        );
    }

    chunks
}

#[allow(clippy::too_many_arguments)]
fn push_accumulated(
    chunks: &mut Vec<CodeChunk>,
    buffer: &[&str],
    file_path: &str,
    language: &str,
    kind: ChunkKind,
    start_line: usize,
    end_line: usize,
    imports: &[String],
    config: &ChunkerConfig,
) {
    let content = buffer.join("\n");
    if content.len() < config.min_chunk_size {
        return;
    }
    chunks.push(CodeChunk {
        content_hash: blake3_hex(&content),
        function_name: None,
        class_name: None,
        imports: imports.to_vec(),
        context: None,
        file_path: file_path.to_string(),
        language: language.to_string(),
        partial: false,
        content,
        start_line,
        end_line,
        kind,
    });
}

fn blake3_hex(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}
