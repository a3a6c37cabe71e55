use serde::{Deserialize, Serialize};

/// BM25 scoring implementation
///
/// Formula:
/// BM25 = Σ(t∈q) ln(1 + (N - f_t + 0.5) / (f_t + 0.5)) * TF_BM25
///
/// where TF_BM25 = (f_t,d * (k1 + 1)) / (f_t,d + k1 * ((1 - b) + (b * ℓ_d / ℓ_avg)))
///
/// The `1 +` inside the logarithm keeps the IDF positive even for terms that
/// occur in more than half of the documents.

/// BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BM25Params {
    pub k1: f32, // Term frequency saturation parameter (typical: 1.2)
    pub b: f32,  // Length normalization parameter (typical: 0.75)
}

impl Default for BM25Params {
    fn default() -> Self {
        BM25Params { k1: 1.2, b: 0.75 }
    }
}

/// Compute IDF component for a term
/// IDF = ln(1 + (N - f_t + 0.5) / (f_t + 0.5))
///
/// # Arguments
/// * `n` - Total number of documents (N)
/// * `f_t` - Number of documents containing term t (document frequency)
pub fn compute_idf(n: u32, f_t: u32) -> f32 {
    let n = n as f32;
    let f_t = f_t as f32;

    (1.0 + (n - f_t + 0.5) / (f_t + 0.5)).ln()
}

/// Compute TF component for BM25
/// TF_BM25 = (f_t,d * (k1 + 1)) / (f_t,d + k1 * ((1 - b) + (b * ℓ_d / ℓ_avg)))
///
/// # Arguments
/// * `f_td` - Term frequency in document (f_t,d)
/// * `doc_len` - Document length (ℓ_d)
/// * `avg_doc_len` - Average document length (ℓ_avg)
/// * `params` - BM25 parameters (k1, b)
pub fn compute_tf_bm25(f_td: u32, doc_len: u32, avg_doc_len: f32, params: &BM25Params) -> f32 {
    let f_td = f_td as f32;
    let doc_len = doc_len as f32;
    let k1 = params.k1;
    let b = params.b;
    // an empty field collection has no meaningful average
    let length_ratio = if avg_doc_len > 0.0 {
        doc_len / avg_doc_len
    } else {
        1.0
    };

    let numerator = f_td * (k1 + 1.0);
    let denominator = f_td + k1 * ((1.0 - b) + (b * length_ratio));

    numerator / denominator
}

/// Everything needed to score one query term (or phrase) inside a field,
/// computed once per query from snapshot-wide statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Weight {
    pub idf: f32,
    pub avg_field_length: f32,
    pub params: BM25Params,
}

impl Bm25Weight {
    pub fn for_term(doc_freq: u32, max_doc: u32, avg_field_length: f32, params: BM25Params) -> Self {
        Self {
            idf: compute_idf(max_doc, doc_freq),
            avg_field_length,
            params,
        }
    }

    /// Phrases are weighted with the sum of their terms' IDFs.
    pub fn for_phrase(doc_freqs: &[u32], max_doc: u32, avg_field_length: f32, params: BM25Params) -> Self {
        Self {
            idf: doc_freqs.iter().map(|&f_t| compute_idf(max_doc, f_t)).sum(),
            avg_field_length,
            params,
        }
    }

    pub fn score(&self, term_frequency: u32, field_length: u32) -> f32 {
        self.idf * compute_tf_bm25(term_frequency, field_length, self.avg_field_length, &self.params)
    }
}
