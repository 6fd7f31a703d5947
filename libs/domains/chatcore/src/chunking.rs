//! Text-chunking algorithms for the File Handler (overlapping windows) and the KB
//! Handler (sentence-boundary chunks).

/// Priority-ordered separators the File Handler's window-end search considers,
/// from most to least preferred.
const WINDOW_SEPARATORS: &[&str] = &[". ", ".\n", "\n\n", "\n", " "];

/// Split `text` into overlapping windows of roughly `target_size` characters with
/// `overlap` characters of repeated context between consecutive windows. Each
/// window's end is pulled back to the last occurrence of a separator (searched in
/// `WINDOW_SEPARATORS` priority order) found within the second half of the window,
/// so chunks tend to end on sentence or paragraph boundaries instead of mid-word.
pub fn chunk_with_overlap(text: &str, target_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len <= target_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let ideal_end = (start + target_size).min(len);
        let end = if ideal_end == len {
            len
        } else {
            find_window_end(&chars, start, ideal_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        chunks.push(chunk);

        if end >= len {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

fn find_window_end(chars: &[char], start: usize, ideal_end: usize) -> usize {
    let half = start + (ideal_end - start) / 2;
    let window: String = chars[half..ideal_end].iter().collect();

    for separator in WINDOW_SEPARATORS {
        if let Some(rel_pos) = window.rfind(separator) {
            let char_offset = window[..rel_pos].chars().count() + separator.chars().count();
            return half + char_offset;
        }
    }
    ideal_end
}

/// Split `text` into chunks bounded by `max_chars`, breaking only on sentence
/// terminators (`.`, `!`, `?`) followed by whitespace. Sentences are accumulated
/// greedily into a buffer and flushed once the next sentence would overflow it.
/// A single sentence longer than `max_chars` is flushed on its own, then split by
/// whitespace into word-limited sub-chunks.
pub fn chunk_by_sentence(text: &str, max_chars: usize) -> Vec<String> {
    let sentences = split_into_sentences(text);
    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for sentence in sentences {
        if sentence.chars().count() > max_chars {
            if !buffer.is_empty() {
                chunks.push(std::mem::take(&mut buffer));
            }
            chunks.extend(split_by_words(&sentence, max_chars));
            continue;
        }

        let candidate_len = buffer.chars().count() + sentence.chars().count();
        if !buffer.is_empty() && candidate_len > max_chars {
            chunks.push(std::mem::take(&mut buffer));
        }
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(&sentence);
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }
    chunks
}

fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if matches!(chars.peek(), Some(next) if next.is_whitespace()) || chars.peek().is_none() {
                sentences.push(current.trim().to_string());
                current.clear();
            }
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}

fn split_by_words(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for word in sentence.split_whitespace() {
        let candidate_len = buffer.chars().count() + word.chars().count() + 1;
        if !buffer.is_empty() && candidate_len > max_chars {
            chunks.push(std::mem::take(&mut buffer));
        }
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(word);
    }
    if !buffer.is_empty() {
        chunks.push(buffer);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_chunking_covers_whole_text_without_gaps() {
        let text = "Sentence one. Sentence two. Sentence three. Sentence four. Sentence five.";
        let chunks = chunk_with_overlap(text, 30, 10);
        assert!(chunks.len() > 1);
        assert!(chunks[0].chars().count() <= 30 + 5);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_with_overlap("short text", 1000, 200);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn overlap_chunking_prefers_sentence_boundary() {
        let text = format!("{}. {}", "a".repeat(400), "b".repeat(400));
        let chunks = chunk_with_overlap(&text, 500, 100);
        assert!(chunks[0].ends_with(". ") || chunks[0].ends_with('.'));
    }

    #[test]
    fn sentence_chunking_respects_max_chars() {
        let text = "One. Two. Three. Four. Five. Six. Seven. Eight. Nine. Ten.";
        let chunks = chunk_by_sentence(text, 20);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20, "chunk too long: {chunk}");
        }
    }

    #[test]
    fn sentence_chunking_splits_oversized_sentence_by_words() {
        let long_sentence = (0..20).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_by_sentence(&long_sentence, 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30);
        }
    }
}
