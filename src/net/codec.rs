//! 作业消息二进制编解码
//!
//! 帧格式：`[4 字节大端长度][UTF-8 标签字节][4 字节大端有符号代码]`。
//! 无校验和，无协议版本协商，标签字符串本身就是消息的判别依据。
//!
//! 解码按"尽量多"原则工作：一次读事件中合并到达的多个完整帧全部
//! 解出，残缺帧的字节留在缓冲区等待下一次读取。

use bytes::{Buf, BufMut, BytesMut};

use super::message::JobMsg;
use crate::core::error::CoordError;

/// 通道固定缓冲容量（字节）
pub const BUFFER_CAPACITY: usize = 256;
/// 每帧的定长开销：长度前缀 4 字节 + 代码 4 字节
pub const FRAME_OVERHEAD: usize = 8;
/// 标签字节数上限，超出即无法装入一个通道缓冲
pub const MAX_TAG_LEN: usize = BUFFER_CAPACITY - FRAME_OVERHEAD;

/// 把一条消息编码进输出缓冲
///
/// 标签超长是调用方错误，这里显式拒绝而不是截断或写出畸形帧。
pub fn encode(msg: &JobMsg, buf: &mut BytesMut) -> Result<(), CoordError> {
    let tag = msg.tag().as_bytes();
    if tag.len() > MAX_TAG_LEN {
        return Err(CoordError::TagTooLong {
            len: tag.len(),
            max: MAX_TAG_LEN,
        });
    }
    buf.reserve(FRAME_OVERHEAD + tag.len());
    buf.put_u32(tag.len() as u32);
    buf.put_slice(tag);
    buf.put_i32(msg.code());
    Ok(())
}

/// 从输入缓冲解出一个完整帧
///
/// 返回 `Ok(None)` 表示缓冲中还没有凑齐一帧（字节保留原位）；
/// 声明长度越界或标签不是合法 UTF-8 视为字节流已错位，返回错误。
pub fn decode(buf: &mut BytesMut) -> Result<Option<JobMsg>, CoordError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let declared = {
        let mut prefix = &buf[..4];
        prefix.get_u32() as usize
    };
    if declared > MAX_TAG_LEN {
        return Err(CoordError::CorruptFrame(format!(
            "declared tag length {} exceeds bound {}",
            declared, MAX_TAG_LEN
        )));
    }
    if buf.len() < FRAME_OVERHEAD + declared {
        return Ok(None);
    }

    buf.advance(4);
    let tag_bytes = buf.split_to(declared);
    let tag = std::str::from_utf8(&tag_bytes)
        .map_err(|e| CoordError::CorruptFrame(format!("tag is not valid UTF-8: {}", e)))?
        .to_owned();
    let code = buf.get_i32();
    Ok(Some(JobMsg::new(tag, code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(msg: &JobMsg) -> BytesMut {
        let mut buf = BytesMut::new();
        encode(msg, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_round_trip() {
        for msg in [
            JobMsg::new("goto_charge", 0),
            JobMsg::new("goto_charge", 1),
            JobMsg::new("need_to_resume", -7),
            JobMsg::new("", 42),
            JobMsg::new("标定完成", 1),
        ] {
            let mut buf = encoded(&msg);
            let back = decode(&mut buf).unwrap().unwrap();
            assert_eq!(back, msg);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_frame_layout_is_big_endian() {
        let buf = encoded(&JobMsg::new("ab", 1));
        assert_eq!(&buf[..], &[0, 0, 0, 2, b'a', b'b', 0, 0, 0, 1]);
    }

    #[test]
    fn test_decodes_all_coalesced_frames() {
        let mut buf = BytesMut::new();
        encode(&JobMsg::new("goto_charge", 0), &mut buf).unwrap();
        encode(&JobMsg::new("goto_charge", 1), &mut buf).unwrap();
        encode(&JobMsg::new("done_charging", 0), &mut buf).unwrap();

        assert_eq!(decode(&mut buf).unwrap(), Some(JobMsg::new("goto_charge", 0)));
        assert_eq!(decode(&mut buf).unwrap(), Some(JobMsg::new("goto_charge", 1)));
        assert_eq!(decode(&mut buf).unwrap(), Some(JobMsg::new("done_charging", 0)));
        assert_eq!(decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_partial_frame_is_retained() {
        let full = encoded(&JobMsg::new("started_charging", 1));

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&full[..7]);
        assert_eq!(decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 7);

        buf.extend_from_slice(&full[7..]);
        assert_eq!(
            decode(&mut buf).unwrap(),
            Some(JobMsg::new("started_charging", 1))
        );
    }

    #[test]
    fn test_rejects_oversize_tag_on_encode() {
        let msg = JobMsg::new("x".repeat(MAX_TAG_LEN + 1), 0);
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode(&msg, &mut buf),
            Err(CoordError::TagTooLong { .. })
        ));
        assert!(buf.is_empty());

        let ok = JobMsg::new("x".repeat(MAX_TAG_LEN), 0);
        assert!(encode(&ok, &mut buf).is_ok());
    }

    #[test]
    fn test_rejects_corrupt_length_on_decode() {
        let mut buf = BytesMut::new();
        buf.put_u32(4096);
        buf.put_slice(&[0u8; 16]);
        assert!(matches!(
            decode(&mut buf),
            Err(CoordError::CorruptFrame(_))
        ));
    }

    #[test]
    fn test_rejects_non_utf8_tag() {
        let mut buf = BytesMut::new();
        buf.put_u32(2);
        buf.put_slice(&[0xff, 0xfe]);
        buf.put_i32(0);
        assert!(matches!(
            decode(&mut buf),
            Err(CoordError::CorruptFrame(_))
        ));
    }
}
