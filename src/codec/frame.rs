//! CESR framing (§4.1): encode/decode a single event frame, attach and
//! parse indexed signatures, and scan a raw byte stream of concatenated
//! frames (§6, "also accepts raw concatenated CESR frames").

use nom::bytes::complete::{tag, take};
use nom::IResult;
use serde_json::Value;

use crate::codec::error::Error;
use crate::codec::prefix::{AttachedSignaturePrefix, DigestAlgorithm, Prefix, SelfAddressingPrefix, SelfSigningPrefix};
use crate::codec::version::{Family, VersionString, VERSION_STRING_LEN};

/// Tag introducing the indexed-signature attachment group (§4.1).
const SIG_GROUP_TAG: &str = "-AAD";

/// A decoded frame: the parsed version string, the JSON body, and the raw
/// attachment bytes that followed it (possibly empty).
pub struct DecodedFrame {
    pub version: VersionString,
    pub json: Value,
    pub attachments: Vec<u8>,
}

fn version_string_from_body(body: &[u8]) -> Result<VersionString, Error> {
    const PREFIX: &str = "{\"v\":\"";
    let text = std::str::from_utf8(body)
        .map_err(|_| Error::MalformedFrame("body is not valid UTF-8".into()))?;
    if !text.starts_with(PREFIX) {
        return Err(Error::MalformedFrame(
            "`v` must be the first field of the event".into(),
        ));
    }
    let rest = &text[PREFIX.len()..];
    if rest.len() < VERSION_STRING_LEN {
        return Err(Error::MalformedFrame("body too short for version string".into()));
    }
    rest[..VERSION_STRING_LEN].parse()
}

/// `encode(obj, family) -> bytes` (§4.1): stamp `obj`'s `v` field with the
/// correct version string (family tag + this body's own byte length) and
/// serialize. `obj` must already carry a `v` field in first position (any
/// value; it is overwritten).
pub fn encode(obj: &Value, family: Family) -> Result<Vec<u8>, Error> {
    let mut map = obj
        .as_object()
        .ok_or_else(|| Error::MalformedFrame("event is not a JSON object".into()))?
        .clone();
    map.insert(
        "v".to_string(),
        Value::String(VersionString::empty(family).to_string()),
    );
    let sized = serde_json::to_vec(&Value::Object(map.clone()))?;
    let size = sized.len();
    map.insert(
        "v".to_string(),
        Value::String(VersionString::new(family, size).to_string()),
    );
    Ok(serde_json::to_vec(&Value::Object(map))?)
}

/// Sizes and self-addresses `obj` in the order invariant 1 (§3) and §4.1
/// require: `obj`'s digest field(s) (`fields`) are set to a full-length
/// placeholder *before* `v` is stamped with the body's true size, and only
/// then is the SAID computed and bound into `fields` (same-length text, so
/// binding it afterward never changes the size `v` already recorded).
/// Computing the SAID first (over an unsized `v`) and sizing afterward, as
/// `encode` alone would do, stamps a `v` the digest preimage never saw.
pub fn encode_saidified(
    obj: &Value,
    fields: &[&str],
    family: Family,
    algorithm: DigestAlgorithm,
) -> Result<(Vec<u8>, SelfAddressingPrefix), Error> {
    let mut map = obj
        .as_object()
        .ok_or_else(|| Error::MalformedFrame("event is not a JSON object".into()))?
        .clone();
    let dummy = crate::codec::said::placeholder(algorithm);
    for field in fields {
        map.insert((*field).to_string(), Value::String(dummy.clone()));
    }
    let sized_bytes = encode(&Value::Object(map), family)?;
    let sized_value: Value = serde_json::from_slice(&sized_bytes)?;
    let said = crate::codec::said::compute_said_multi(&sized_value, fields, algorithm)?;

    let mut final_map = sized_value
        .as_object()
        .expect("encode always returns a JSON object")
        .clone();
    for field in fields {
        final_map.insert((*field).to_string(), Value::String(said.to_text()));
    }
    let framed = encode(&Value::Object(final_map), family)?;
    Ok((framed, said))
}

/// `decode(bytes) -> (version, json, attachments)` (§4.1): validate the
/// declared size matches the body's actual re-serialized length, and
/// return the JSON body plus whatever attachment bytes followed it.
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame, Error> {
    let version = version_string_from_body(bytes)?;
    if bytes.len() < version.size {
        return Err(Error::SizeMismatch {
            declared: version.size,
            actual: bytes.len(),
        });
    }
    let body = &bytes[..version.size];
    let json: Value = serde_json::from_slice(body)?;
    let reencoded = serde_json::to_vec(&json)?;
    if reencoded.len() != version.size {
        return Err(Error::SizeMismatch {
            declared: version.size,
            actual: reencoded.len(),
        });
    }
    Ok(DecodedFrame {
        version,
        json,
        attachments: bytes[version.size..].to_vec(),
    })
}

fn format_index(index: u16) -> String {
    format!("{:02}", index)
}

/// `sign_event(bytes, signer) -> bytes` (§4.1): append a single
/// `-AAD01<idx><sig>` attachment signing the JSON body (the portion of
/// `bytes` preceding any attachments already present).
pub fn sign_event(bytes: &[u8], index: u16, signature: &SelfSigningPrefix) -> Result<Vec<u8>, Error> {
    let version = version_string_from_body(bytes)?;
    let mut out = bytes[..version.size].to_vec();
    out.extend_from_slice(SIG_GROUP_TAG.as_bytes());
    out.extend_from_slice(b"01");
    out.extend_from_slice(format_index(index).as_bytes());
    out.extend_from_slice(signature.to_text().as_bytes());
    Ok(out)
}

fn sig_group(input: &[u8]) -> IResult<&[u8], Vec<(u16, SelfSigningPrefix)>> {
    let (input, _) = tag(SIG_GROUP_TAG.as_bytes())(input)?;
    let (input, count_bytes) = take(2usize)(input)?;
    let count_str = std::str::from_utf8(count_bytes).unwrap_or_default();
    let count = u8::from_str_radix(count_str, 16).unwrap_or(0) as usize;

    let mut sigs = Vec::with_capacity(count);
    let mut remaining = input;
    for _ in 0..count {
        let (rest, idx_bytes) = take(2usize)(remaining)?;
        let (rest, sig_bytes) = take(88usize)(rest)?;
        let idx_str = std::str::from_utf8(idx_bytes).unwrap_or_default();
        let sig_str = std::str::from_utf8(sig_bytes).unwrap_or_default();
        let index: u16 = idx_str.parse().unwrap_or(0);
        if let Ok(sig) = sig_str.parse::<SelfSigningPrefix>() {
            sigs.push((index, sig));
        }
        remaining = rest;
    }
    Ok((remaining, sigs))
}

/// `parse_indexed_signatures(bytes) -> [(index, sig)]` (§4.1). `bytes` is
/// the attachment span returned by [`decode`] (or produced by
/// [`sign_event`]); anything before the first `-AAD` tag is ignored.
pub fn parse_indexed_signatures(bytes: &[u8]) -> Result<Vec<(u16, SelfSigningPrefix)>, Error> {
    match sig_group(bytes) {
        Ok((_, sigs)) => Ok(sigs),
        Err(_) => Err(Error::MalformedFrame(
            "attachments do not contain a well-formed -AAD signature group".into(),
        )),
    }
}

/// Converts `(index, signature)` pairs into [`AttachedSignaturePrefix`]
/// values for callers that want the typed prefix rather than the raw tuple.
pub fn attached_signatures(pairs: Vec<(u16, SelfSigningPrefix)>) -> Vec<AttachedSignaturePrefix> {
    pairs
        .into_iter()
        .map(|(index, signature)| AttachedSignaturePrefix::new(index, signature))
        .collect()
}

/// Scans a byte buffer of concatenated CESR frames (no bundle envelope;
/// §6, §10.4) and returns each frame's bytes (body + any attachments that
/// immediately precede the next frame's `{"v":"..."` boundary).
pub fn scan_frames(bytes: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    let mut frames = Vec::new();
    let mut cursor = 0;
    while cursor < bytes.len() {
        let remaining = &bytes[cursor..];
        let version = version_string_from_body(remaining)?;
        if remaining.len() < version.size {
            return Err(Error::SizeMismatch {
                declared: version.size,
                actual: remaining.len(),
            });
        }
        let mut frame_end = version.size;
        // Greedily consume one trailing signature group, if present, so
        // each returned frame carries its own attachment span.
        if remaining[frame_end..].starts_with(SIG_GROUP_TAG.as_bytes()) {
            if let Ok((rest, sigs)) = sig_group(&remaining[frame_end..]) {
                let consumed = remaining[frame_end..].len() - rest.len();
                let _ = sigs;
                frame_end += consumed;
            }
        }
        frames.push(remaining[..frame_end].to_vec());
        cursor += frame_end;
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::crypto::{Crypto, Ed25519Blake3};
    use serde_json::json;

    #[test]
    fn encode_decode_roundtrip() {
        let obj = json!({"v": "", "t": "icp", "s": "0", "d": "", "i": ""});
        let bytes = encode(&obj, Family::Keri).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.version.family, Family::Keri);
        assert!(decoded.attachments.is_empty());
        assert_eq!(decoded.json["t"], "icp");
    }

    #[test]
    fn sign_and_parse_roundtrip() {
        let obj = json!({"v": "", "t": "icp", "s": "0", "d": "", "i": ""});
        let bytes = encode(&obj, Family::Keri).unwrap();

        let crypto = Ed25519Blake3::default();
        let (_, key) = crypto.keypair_from_seed(&[3u8; 32]).unwrap();
        let raw_sig = crypto.sign(&key, &bytes).unwrap();
        let sig = SelfSigningPrefix::Ed25519Sha512(raw_sig);

        let signed = sign_event(&bytes, 0, &sig).unwrap();
        let decoded = decode(&signed).unwrap();
        let parsed = parse_indexed_signatures(&decoded.attachments).unwrap();
        assert_eq!(parsed, vec![(0, sig)]);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let obj = json!({"v": "", "t": "icp", "s": "0", "d": "", "i": ""});
        // A stray byte in the size digits no longer matches the body's
        // actual re-serialized length.
        let mut corrupted = encode(&obj, Family::Keri).unwrap();
        corrupted[12] = b'f';
        assert!(decode(&corrupted).is_err());
    }

    #[test]
    fn encode_saidified_said_matches_stored_bytes() {
        let obj = json!({"v": "", "t": "icp", "s": "0", "d": "", "i": "", "k": ["Dkey"]});
        let (bytes, said) = encode_saidified(&obj, &["d"], Family::Keri, crate::codec::prefix::DigestAlgorithm::Blake3_256).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.json["d"], said.to_text());
        assert!(crate::codec::said::verify_said(&decoded.json, "d").unwrap());
    }

    #[test]
    fn encode_saidified_binds_two_fields_for_registries() {
        let obj = json!({"v": "", "t": "vcp", "i": "", "s": "0", "d": "", "ii": "Dissuer"});
        let (bytes, said) = encode_saidified(&obj, &["i", "d"], Family::Keri, crate::codec::prefix::DigestAlgorithm::Blake3_256).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.json["i"], said.to_text());
        assert_eq!(decoded.json["d"], said.to_text());
        assert!(crate::codec::said::verify_said_multi(&decoded.json, &["i", "d"], "d").unwrap());
    }

    #[test]
    fn scan_frames_splits_concatenated_stream() {
        let a = encode(&json!({"v": "", "t": "icp", "s": "0", "d": "", "i": ""}), Family::Keri).unwrap();
        let b = encode(&json!({"v": "", "t": "ixn", "s": "1", "d": "", "i": "", "p": "", "a": []}), Family::Keri).unwrap();
        let mut stream = a.clone();
        stream.extend_from_slice(&b);
        let frames = scan_frames(&stream).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], a);
        assert_eq!(frames[1], b);
    }
}
