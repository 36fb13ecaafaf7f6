//! 作业通道的套接字级集成测试
//!
//! 用真实回环 TCP 验证两种角色的互通、合并到达的多帧解码、
//! 以及停机的幂等性。

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use waldo::net::channel::{ChannelOptions, JobChannel, JobPort};
use waldo::net::message::{tags, JobMsg};
use waldo::net::queue::MessageQueue;

fn options() -> ChannelOptions {
    ChannelOptions {
        connect_timeout: Duration::from_secs(5),
        stop_grace: Duration::from_secs(1),
    }
}

/// 轮询等待一条期望的消息被摘走
async fn wait_for(queue: &MessageQueue, wanted: &JobMsg) -> bool {
    timeout(Duration::from_secs(5), async {
        loop {
            if queue.take(wanted) {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or(false)
}

#[tokio::test]
async fn test_client_server_roundtrip() {
    let server = JobChannel::listen("127.0.0.1:0", options()).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let client = JobChannel::connect(&addr, options()).await.unwrap();

    // 等服务端接纳对端
    timeout(Duration::from_secs(5), async {
        while !server.is_connected() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // 臂侧发请求，底盘侧回应答
    client.send(&JobMsg::request(tags::GOTO_CHARGE)).await.unwrap();
    assert!(wait_for(&server.inbound(), &JobMsg::request(tags::GOTO_CHARGE)).await);

    server.send(&JobMsg::ack(tags::GOTO_CHARGE)).await.unwrap();
    assert!(wait_for(&client.inbound(), &JobMsg::ack(tags::GOTO_CHARGE)).await);

    client.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_value_matching_leaves_other_messages() {
    let server = JobChannel::listen("127.0.0.1:0", options()).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let client = JobChannel::connect(&addr, options()).await.unwrap();

    client.send(&JobMsg::new(tags::GOTO_CHARGE, 0)).await.unwrap();
    client.send(&JobMsg::new(tags::GOTO_CHARGE, 1)).await.unwrap();

    let inbound = server.inbound();
    assert!(wait_for(&inbound, &JobMsg::new(tags::GOTO_CHARGE, 1)).await);
    // code 0 的那条还留在队列里给别的等待者
    assert_eq!(inbound.pop(), Some(JobMsg::new(tags::GOTO_CHARGE, 0)));

    client.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_coalesced_frames_all_decoded() {
    let server = JobChannel::listen("127.0.0.1:0", options()).await.unwrap();
    let addr = server.local_addr().unwrap();

    // 裸流一次写出三个帧，通道必须全部解出
    let mut raw = TcpStream::connect(addr).await.unwrap();
    let mut bytes = Vec::new();
    for (tag, code) in [
        (tags::GOTO_CHARGE, 0i32),
        (tags::STARTED_CHARGING, 0),
        (tags::DONE_CHARGING, 1),
    ] {
        bytes.extend_from_slice(&(tag.len() as u32).to_be_bytes());
        bytes.extend_from_slice(tag.as_bytes());
        bytes.extend_from_slice(&code.to_be_bytes());
    }
    raw.write_all(&bytes).await.unwrap();
    raw.flush().await.unwrap();

    let inbound = server.inbound();
    assert!(wait_for(&inbound, &JobMsg::new(tags::GOTO_CHARGE, 0)).await);
    assert!(wait_for(&inbound, &JobMsg::new(tags::STARTED_CHARGING, 0)).await);
    assert!(wait_for(&inbound, &JobMsg::new(tags::DONE_CHARGING, 1)).await);

    server.stop().await;
}

#[tokio::test]
async fn test_split_frame_is_retained_until_complete() {
    let server = JobChannel::listen("127.0.0.1:0", options()).await.unwrap();
    let addr = server.local_addr().unwrap();

    let mut raw = TcpStream::connect(addr).await.unwrap();
    let tag = tags::GOTO_CALIBRATE;
    let mut frame = Vec::new();
    frame.extend_from_slice(&(tag.len() as u32).to_be_bytes());
    frame.extend_from_slice(tag.as_bytes());
    frame.extend_from_slice(&0i32.to_be_bytes());

    // 前半帧先到，残字节必须留在缓冲里等后半
    let (head, tail) = frame.split_at(7);
    raw.write_all(head).await.unwrap();
    raw.flush().await.unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(server.inbound().is_empty());

    raw.write_all(tail).await.unwrap();
    raw.flush().await.unwrap();
    assert!(wait_for(&server.inbound(), &JobMsg::request(tag)).await);

    server.stop().await;
}

#[tokio::test]
async fn test_peer_close_marks_disconnected() {
    let server = JobChannel::listen("127.0.0.1:0", options()).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let client = JobChannel::connect(&addr, options()).await.unwrap();

    timeout(Duration::from_secs(5), async {
        while !server.is_connected() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    client.stop().await;

    // 对端关闭后服务端读循环退出，连接状态转为断开
    timeout(Duration::from_secs(5), async {
        while server.is_connected() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(server.send(&JobMsg::request(tags::GOTO_CHARGE)).await.is_err());

    server.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let server = JobChannel::listen("127.0.0.1:0", options()).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let client = JobChannel::connect(&addr, options()).await.unwrap();

    client.stop().await;
    client.stop().await;
    server.stop().await;
    server.stop().await;
}
