//! 作业通道
//!
//! 在一条 TCP 流上异步收发作业消息，收发都不阻塞调用方：
//! - 每个通道独占一个后台读循环，把线缆上解出的消息推进入站队列
//! - `send` 可从任意任务调用，同一通道内部串行化（一次只有一个
//!   编码 + 写出在途）
//! - 循环内任何 I/O 故障记日志并停止循环，不做自动重连
//!
//! 服务端角色按设计只接纳一个对端：首个连接被接受后监听器即关闭，
//! 后续连接尝试会被拒绝。

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::codec;
use super::message::JobMsg;
use super::queue::MessageQueue;
use crate::core::error::CoordError;

/// 通道参数
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// 客户端建连等待上限
    pub connect_timeout: Duration,
    /// `stop` 等待读循环自行退出的宽限期，超时后强制中止
    pub stop_grace: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(5),
        }
    }
}

/// 状态机看到的通道能力：发消息、取入站队列、查连接状态
///
/// 拆成 trait 是为了让状态机既能驱动真实 TCP 通道，也能驱动
/// 测试里的记录型端口。
#[async_trait]
pub trait JobPort: Send + Sync {
    /// 编码并写出一条消息，同一端口内部串行
    async fn send(&self, msg: &JobMsg) -> Result<(), CoordError>;

    /// 入站消息队列，消费方按值匹配摘取
    fn inbound(&self) -> Arc<MessageQueue>;

    /// 通道是否仍然存活（读循环退出或对端关闭后为 false）
    fn is_connected(&self) -> bool;
}

/// TCP 作业通道，客户端与服务端角色共用一个类型
pub struct JobChannel {
    role: &'static str,
    inbound: Arc<MessageQueue>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: Option<SocketAddr>,
    stop_grace: Duration,
}

impl JobChannel {
    /// 客户端角色：连接远端并启动读循环
    pub async fn connect(addr: &str, opts: ChannelOptions) -> Result<Self, CoordError> {
        let stream = timeout(opts.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| CoordError::ConnectTimeout {
                addr: addr.to_string(),
                timeout_ms: opts.connect_timeout.as_millis() as u64,
            })??;
        stream.set_nodelay(true)?;
        info!("job channel connected to {}", addr);

        let (reader, writer) = stream.into_split();
        let inbound = Arc::new(MessageQueue::new());
        let connected = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_loop(
            "client",
            reader,
            Arc::clone(&inbound),
            Arc::clone(&connected),
            cancel.clone(),
        ));

        Ok(Self {
            role: "client",
            inbound,
            writer: Arc::new(Mutex::new(Some(writer))),
            connected,
            cancel,
            loop_task: Mutex::new(Some(task)),
            local_addr: None,
            stop_grace: opts.stop_grace,
        })
    }

    /// 服务端角色：绑定本地地址，后台等待唯一对端接入
    pub async fn listen(addr: &str, opts: ChannelOptions) -> Result<Self, CoordError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("job channel listening on {}", local_addr);

        let inbound = Arc::new(MessageQueue::new());
        let connected = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let writer = Arc::new(Mutex::new(None));
        let task = tokio::spawn(accept_then_read(
            listener,
            Arc::clone(&writer),
            Arc::clone(&inbound),
            Arc::clone(&connected),
            cancel.clone(),
        ));

        Ok(Self {
            role: "server",
            inbound,
            writer,
            connected,
            cancel,
            loop_task: Mutex::new(Some(task)),
            local_addr: Some(local_addr),
            stop_grace: opts.stop_grace,
        })
    }

    /// 服务端实际绑定的地址（测试用 0 号端口时从这里取回）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 协作式停机：通知读循环退出，限期不退则强制中止，再关闭写端。
    /// 重复调用是安全的。
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(mut handle) = self.loop_task.lock().await.take() {
            if timeout(self.stop_grace, &mut handle).await.is_err() {
                warn!(
                    "job channel {} loop did not exit within {:?}, aborting",
                    self.role, self.stop_grace
                );
                handle.abort();
            }
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.connected.store(false, Ordering::Release);
        info!("job channel {} stopped", self.role);
    }
}

#[async_trait]
impl JobPort for JobChannel {
    async fn send(&self, msg: &JobMsg) -> Result<(), CoordError> {
        if !self.is_connected() {
            return Err(CoordError::NotConnected);
        }
        let mut slot = self.writer.lock().await;
        let writer = slot.as_mut().ok_or(CoordError::NotConnected)?;
        let mut buf = BytesMut::with_capacity(codec::BUFFER_CAPACITY);
        codec::encode(msg, &mut buf)?;
        writer.write_all(&buf).await?;
        debug!("job message sent: {}", msg);
        Ok(())
    }

    fn inbound(&self) -> Arc<MessageQueue> {
        Arc::clone(&self.inbound)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// 服务端后台任务：接受唯一对端，然后进入读循环
async fn accept_then_read(
    listener: TcpListener,
    writer_slot: Arc<Mutex<Option<OwnedWriteHalf>>>,
    inbound: Arc<MessageQueue>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let (stream, peer) = tokio::select! {
        _ = cancel.cancelled() => return,
        accepted = listener.accept() => match accepted {
            Ok(pair) => pair,
            Err(e) => {
                error!("job channel accept failed: {}", e);
                return;
            }
        },
    };
    if let Err(e) = stream.set_nodelay(true) {
        warn!("set_nodelay failed on accepted peer: {}", e);
    }
    info!("job channel peer connected from {}", peer);

    let (reader, writer) = stream.into_split();
    *writer_slot.lock().await = Some(writer);
    connected.store(true, Ordering::Release);

    // 单对端槽位：关闭监听器，后续连接尝试直接被拒绝
    drop(listener);

    read_loop("server", reader, inbound, connected, cancel).await;
}

/// 读循环：读到多少字节就解出多少完整帧，残帧留待下次
async fn read_loop(
    role: &'static str,
    mut reader: OwnedReadHalf,
    inbound: Arc<MessageQueue>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let mut buf = BytesMut::with_capacity(codec::BUFFER_CAPACITY);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("job channel {} loop stop requested", role);
                break;
            }
            read = reader.read_buf(&mut buf) => match read {
                Ok(0) => {
                    info!("job channel {} peer closed the connection", role);
                    break;
                }
                Ok(_) => {
                    if let Err(e) = drain_frames(&mut buf, &inbound) {
                        error!("job channel {} stream corrupt, stopping loop: {}", role, e);
                        break;
                    }
                }
                Err(e) => {
                    error!("job channel {} read failed, stopping loop: {}", role, e);
                    break;
                }
            }
        }
    }
    connected.store(false, Ordering::Release);
}

fn drain_frames(buf: &mut BytesMut, inbound: &MessageQueue) -> Result<(), CoordError> {
    while let Some(msg) = codec::decode(buf)? {
        debug!("job message received: {}", msg);
        inbound.push(msg);
    }
    Ok(())
}
