pub mod aggregate;
pub mod progress;
pub mod request;
pub mod response;

pub use aggregate::{
    FetchMode, OrderFetchConfig, OrderFetchTask, OrderFetchTaskId, TaskStatus,
    ORDER_FETCHING_TASK_TYPE,
};
pub use progress::{OrderFetchProgress, PeriodError, TotalMonths};
pub use request::{
    ListOrderFetchTasksQuery, OrderStatsQuery, StartOrderFetchRequest, StopOrderFetchRequest,
};
pub use response::{
    OrderFetchTaskListResponse, OrderStatsResponse, PlatformOrderStats, StartOrderFetchResponse,
    StopOrderFetchResponse, TaskLogResponse,
};
